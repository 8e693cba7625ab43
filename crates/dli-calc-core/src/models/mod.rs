//! Domain models for the DLI calculator.

mod method;
mod request;
mod result;

pub use method::*;
pub use request::*;
pub use result::*;
