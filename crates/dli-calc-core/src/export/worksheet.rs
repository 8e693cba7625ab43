//! Collection worksheet export with a tamper-evident fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::DoseEngine;
use crate::models::{DoseRequest, DoseResult};

use super::ExportResult;

/// Worksheet format version.
pub const WORKSHEET_FORMAT_VERSION: &str = "1.0";

/// A calculation packaged for hand-off to the collection team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionWorksheet {
    /// Export metadata
    pub metadata: WorksheetMetadata,
    /// Inputs exactly as calculated
    pub request: DoseRequest,
    /// Engine output
    pub result: DoseResult,
    /// SHA-256 of the canonical request/result JSON
    pub fingerprint: String,
}

/// Worksheet metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorksheetMetadata {
    /// Unique worksheet ID
    pub worksheet_id: String,
    /// Export format version
    pub format_version: String,
    /// Generation timestamp
    pub generated_at: String,
    /// Hash algorithm used for the fingerprint
    pub hash_algorithm: String,
    /// Exporting system identifier
    pub system_id: Option<String>,
}

/// Borrowed view hashed for the fingerprint.
#[derive(Serialize)]
struct FingerprintPayload<'a> {
    request: &'a DoseRequest,
    result: &'a DoseResult,
}

impl CollectionWorksheet {
    /// Package an existing calculation.
    pub fn new(request: DoseRequest, result: DoseResult) -> Result<Self, serde_json::Error> {
        let fingerprint = fingerprint(&request, &result)?;
        Ok(Self {
            metadata: WorksheetMetadata {
                worksheet_id: uuid::Uuid::new_v4().to_string(),
                format_version: WORKSHEET_FORMAT_VERSION.to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                hash_algorithm: "SHA-256".to_string(),
                system_id: None,
            },
            request,
            result,
            fingerprint,
        })
    }

    /// Set the system identifier for exports.
    pub fn with_system_id(mut self, system_id: String) -> Self {
        self.metadata.system_id = Some(system_id);
        self
    }

    /// Recompute the fingerprint and compare it with the stored one.
    pub fn verify_fingerprint(&self) -> Result<bool, serde_json::Error> {
        Ok(fingerprint(&self.request, &self.result)? == self.fingerprint)
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a previously exported worksheet.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Worksheet exporter.
pub struct WorksheetExporter<'a> {
    engine: DoseEngine<'a>,
    system_id: Option<String>,
}

impl<'a> WorksheetExporter<'a> {
    /// Create a new worksheet exporter.
    pub fn new(engine: DoseEngine<'a>) -> Self {
        Self {
            engine,
            system_id: None,
        }
    }

    /// Set the system identifier for exports.
    pub fn with_system_id(mut self, system_id: String) -> Self {
        self.system_id = Some(system_id);
        self
    }

    /// Calculate and package a request.
    pub fn export(&self, request: &DoseRequest) -> ExportResult<CollectionWorksheet> {
        let result = self.engine.compute(request)?;
        let worksheet = CollectionWorksheet::new(request.clone(), result)?;
        Ok(match &self.system_id {
            Some(id) => worksheet.with_system_id(id.clone()),
            None => worksheet,
        })
    }
}

/// SHA-256 over the canonical JSON of a request/result pair.
pub fn fingerprint(request: &DoseRequest, result: &DoseResult) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(&FingerprintPayload { request, result })?;
    Ok(hash_data(payload.as_bytes()))
}

/// Compute SHA-256 hash of data.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
