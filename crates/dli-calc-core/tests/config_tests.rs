//! Configuration loading integration tests.

use std::io::Write;

use dli_calc_core::config::{ConfigError, DoseConfig};
use dli_calc_core::engine::DoseEngine;
use dli_calc_core::models::{CollectionMethod, DonorRelationship, DoseRequest};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_recommended_doses() {
    let file = write_config(r#"{"recommended_doses": {"Matched Sibling": 5, "Haploidentical": 0.5}}"#);
    let config = DoseConfig::load(file.path()).unwrap();

    assert_eq!(
        config.recommended_doses.dose_for(DonorRelationship::MatchedSibling),
        Some(5.0)
    );
    assert_eq!(
        config.recommended_doses.dose_for(DonorRelationship::Haploidentical),
        Some(0.5)
    );
}

#[test]
fn test_load_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = DoseConfig::load(dir.path().join("missing.json")).unwrap_err();
    match err {
        ConfigError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected I/O error, got {other}"),
    }
}

#[test]
fn test_load_or_default_unreadable_path() {
    // A directory exists but cannot be read as a file
    let dir = tempfile::tempdir().unwrap();
    assert!(DoseConfig::load(dir.path()).is_err());
    assert_eq!(DoseConfig::load_or_default(dir.path()), DoseConfig::default());
}

#[test]
fn test_load_or_default_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = DoseConfig::load_or_default(dir.path().join("missing.json"));
    assert_eq!(config, DoseConfig::default());
}

#[test]
fn test_load_or_default_malformed_file() {
    let file = write_config("{ not json");
    let config = DoseConfig::load_or_default(file.path());
    assert_eq!(config, DoseConfig::default());
}

#[test]
fn test_load_method_override_changes_volume() {
    let file = write_config(
        r#"{
            "method_overrides": [{
                "method": "whole_blood",
                "efficiency": 0.5,
                "volume_factor": 1.0,
                "hematocrit_sensitivity": 0.2,
                "rbc_contamination_base": 2000.0,
                "cd3_model": {"base": 55.0, "tlc_weight": 5.0, "lymph_weight": 10.0}
            }]
        }"#,
    );
    let config = DoseConfig::load(file.path()).unwrap();
    let catalog = config.catalog().unwrap();

    let request = DoseRequest::new(CollectionMethod::WholeBlood, 10.0, 70.0, 8.0, 30.0, 70.0);
    let standard = DoseEngine::standard().compute(&request).unwrap();
    let overridden = DoseEngine::new(&catalog).compute(&request).unwrap();

    // Doubling efficiency halves the volume
    assert!((overridden.required_volume_ml * 2.0 - standard.required_volume_ml).abs() < 1e-9);
    assert!(overridden.instrument_parameters.is_empty());
}

#[test]
fn test_load_override_with_ranges() {
    let file = write_config(
        r#"{
            "method_overrides": [{
                "method": "spectra_optia",
                "efficiency": 0.95,
                "volume_factor": 0.2,
                "hematocrit_sensitivity": 0.4,
                "rbc_contamination_base": 3.0,
                "cd3_model": {"base": 68.0, "tlc_weight": 5.0, "lymph_weight": 12.0},
                "parameter_ranges": {
                    "flow_rate": {"min": 55.0, "max": 65.0}
                }
            }]
        }"#,
    );
    let config = DoseConfig::load(file.path()).unwrap();
    let catalog = config.catalog().unwrap();

    let request = DoseRequest::new(CollectionMethod::SpectraOptia, 10.0, 70.0, 8.0, 30.0, 70.0);
    let result = DoseEngine::new(&catalog).compute(&request).unwrap();

    // Only flow rate plus the derating factor
    assert_eq!(result.instrument_parameters.len(), 2);
    // 55 + 10 × 0.3
    assert!((result.instrument_parameters[0].value - 58.0).abs() < 1e-9);
}

#[test]
fn test_load_rejects_invalid_override() {
    let file = write_config(
        r#"{
            "method_overrides": [{
                "method": "haemonetics",
                "efficiency": 0.0,
                "volume_factor": 0.3,
                "hematocrit_sensitivity": 0.6,
                "rbc_contamination_base": 5.0,
                "cd3_model": {"base": 62.0, "tlc_weight": 5.0, "lymph_weight": 12.0}
            }]
        }"#,
    );
    assert!(matches!(
        DoseConfig::load(file.path()),
        Err(ConfigError::Catalog(_))
    ));
    // The lenient loader falls back instead
    assert!(DoseConfig::load_or_default(file.path()).method_overrides.is_empty());
}
