//! Method name normalization.
//!
//! Handles:
//! - Case and separator folding ("spectra-optia" → "spectraoptia")
//! - Instrument and trade aliases (optia, mcs+, wb)

use std::collections::HashMap;

use strsim::jaro_winkler;

use crate::models::CollectionMethod;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.80;

/// Resolves free-text method names to catalog methods.
pub struct MethodNormalizer {
    /// Folded alias → method
    aliases: HashMap<String, CollectionMethod>,
}

impl Default for MethodNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodNormalizer {
    /// Create a normalizer with default aliases.
    pub fn new() -> Self {
        Self {
            aliases: Self::default_aliases(),
        }
    }

    /// Resolve a name to a method, if known.
    pub fn resolve(&self, name: &str) -> Option<CollectionMethod> {
        self.aliases.get(&fold(name)).copied()
    }

    /// Closest display name among `candidates` for an unknown name.
    pub fn suggest<'a, I>(&self, name: &str, candidates: I) -> Option<CollectionMethod>
    where
        I: IntoIterator<Item = &'a CollectionMethod>,
    {
        let folded = fold(name);
        if folded.is_empty() {
            return None;
        }

        candidates
            .into_iter()
            .map(|m| (*m, jaro_winkler(&folded, &fold(m.display_name()))))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(m, _)| m)
    }

    fn default_aliases() -> HashMap<String, CollectionMethod> {
        let mut map = HashMap::new();

        for method in CollectionMethod::ALL {
            map.insert(fold(method.display_name()), method);
        }

        // Whole blood
        map.insert("wb".into(), CollectionMethod::WholeBlood);
        map.insert("wholebloodcollection".into(), CollectionMethod::WholeBlood);
        map.insert("phlebotomy".into(), CollectionMethod::WholeBlood);

        // Haemonetics
        map.insert("haemonetic".into(), CollectionMethod::Haemonetics);
        map.insert("hemonetics".into(), CollectionMethod::Haemonetics);
        map.insert("mcs".into(), CollectionMethod::Haemonetics);
        map.insert("mcsplus".into(), CollectionMethod::Haemonetics);

        // Spectra Optia
        map.insert("optia".into(), CollectionMethod::SpectraOptia);
        map.insert("spectra".into(), CollectionMethod::SpectraOptia);
        map.insert("terumooptia".into(), CollectionMethod::SpectraOptia);

        map
    }
}

/// Lowercase and drop everything but letters and digits; `+` reads as "plus".
fn fold(name: &str) -> String {
    name.replace('+', "plus")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
