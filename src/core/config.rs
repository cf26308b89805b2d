//! Store-level configuration (`<store>/config.toml`).
//!
//! Every heuristic cut-off the analyzer and the vindication checker use is a
//! named constant here. `Thresholds::default()` is built from those constants
//! and any field can be overridden from the `[thresholds]` table:
//!
//! ```toml
//! [thresholds]
//! vindication = 0.75
//! naming_function_share = 0.8
//! ```

use crate::core::error::AimemError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Minimum confidence (inclusive) for an override to count as vindicated.
pub const VINDICATION_THRESHOLD: f64 = 0.7;
/// Lower bound (inclusive) of the "partial match" band in vindication reasons.
pub const PARTIAL_MATCH_THRESHOLD: f64 = 0.4;

/// "use X instead of Y": Y gone, X present, Y was there before.
pub const USE_INSTEAD_FULL_CONFIDENCE: f64 = 0.9;
/// "use X instead of Y": X merely present.
pub const USE_INSTEAD_PARTIAL_CONFIDENCE: f64 = 0.6;
/// "add/include/implement X": X newly present.
pub const ADD_PATTERN_CONFIDENCE: f64 = 0.8;
/// "remove/delete/drop X": X newly absent.
pub const REMOVE_PATTERN_CONFIDENCE: f64 = 0.8;

/// A structure kind must exceed this share of its directory.
pub const ARCHITECTURE_DOMINANCE: f64 = 0.7;
pub const ARCHITECTURE_MIN_COUNT: usize = 3;
pub const ARCHITECTURE_MAX_EVIDENCE: usize = 3;

pub const NAMING_FUNCTION_MIN_ITEMS: usize = 5;
pub const NAMING_FUNCTION_SHARE: f64 = 0.7;
pub const NAMING_CLASS_MIN_ITEMS: usize = 3;
pub const NAMING_CLASS_SHARE: f64 = 0.8;
pub const VERB_PREFIX_MIN_USES: usize = 5;
pub const VERB_PREFIX_CONFIDENCE: f64 = 0.6;

pub const TESTING_MIN_COUNT: usize = 3;

pub const SECURITY_AUTH_MIN_MATCHES: usize = 2;
pub const SECURITY_AUTH_CONFIDENCE: f64 = 0.7;
pub const SECURITY_VALIDATION_MIN_MATCHES: usize = 3;
pub const SECURITY_VALIDATION_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub vindication: f64,
    pub partial_match: f64,
    pub use_instead_full: f64,
    pub use_instead_partial: f64,
    pub add_pattern: f64,
    pub remove_pattern: f64,
    pub architecture_dominance: f64,
    pub architecture_min_count: usize,
    pub architecture_max_evidence: usize,
    pub naming_function_min_items: usize,
    pub naming_function_share: f64,
    pub naming_class_min_items: usize,
    pub naming_class_share: f64,
    pub verb_prefix_min_uses: usize,
    pub verb_prefix_confidence: f64,
    pub testing_min_count: usize,
    pub security_auth_min_matches: usize,
    pub security_auth_confidence: f64,
    pub security_validation_min_matches: usize,
    pub security_validation_confidence: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            vindication: VINDICATION_THRESHOLD,
            partial_match: PARTIAL_MATCH_THRESHOLD,
            use_instead_full: USE_INSTEAD_FULL_CONFIDENCE,
            use_instead_partial: USE_INSTEAD_PARTIAL_CONFIDENCE,
            add_pattern: ADD_PATTERN_CONFIDENCE,
            remove_pattern: REMOVE_PATTERN_CONFIDENCE,
            architecture_dominance: ARCHITECTURE_DOMINANCE,
            architecture_min_count: ARCHITECTURE_MIN_COUNT,
            architecture_max_evidence: ARCHITECTURE_MAX_EVIDENCE,
            naming_function_min_items: NAMING_FUNCTION_MIN_ITEMS,
            naming_function_share: NAMING_FUNCTION_SHARE,
            naming_class_min_items: NAMING_CLASS_MIN_ITEMS,
            naming_class_share: NAMING_CLASS_SHARE,
            verb_prefix_min_uses: VERB_PREFIX_MIN_USES,
            verb_prefix_confidence: VERB_PREFIX_CONFIDENCE,
            testing_min_count: TESTING_MIN_COUNT,
            security_auth_min_matches: SECURITY_AUTH_MIN_MATCHES,
            security_auth_confidence: SECURITY_AUTH_CONFIDENCE,
            security_validation_min_matches: SECURITY_VALIDATION_MIN_MATCHES,
            security_validation_confidence: SECURITY_VALIDATION_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AimemConfig {
    pub thresholds: Thresholds,
}

pub fn config_path(store_root: &Path) -> PathBuf {
    store_root.join(CONFIG_FILE_NAME)
}

/// Load `<store>/config.toml`. No file means defaults, not an error.
pub fn load_config(store_root: &Path) -> Result<AimemConfig, AimemError> {
    let path = config_path(store_root);
    if !path.exists() {
        return Ok(AimemConfig::default());
    }
    let content = fs::read_to_string(&path).map_err(AimemError::IoError)?;
    let config: AimemConfig = toml::from_str(&content)?;
    validate_thresholds(&config.thresholds)?;
    Ok(config)
}

fn validate_thresholds(t: &Thresholds) -> Result<(), AimemError> {
    let ratios = [
        ("vindication", t.vindication),
        ("partial_match", t.partial_match),
        ("use_instead_full", t.use_instead_full),
        ("use_instead_partial", t.use_instead_partial),
        ("add_pattern", t.add_pattern),
        ("remove_pattern", t.remove_pattern),
        ("architecture_dominance", t.architecture_dominance),
        ("naming_function_share", t.naming_function_share),
        ("naming_class_share", t.naming_class_share),
        ("verb_prefix_confidence", t.verb_prefix_confidence),
        ("security_auth_confidence", t.security_auth_confidence),
        ("security_validation_confidence", t.security_validation_confidence),
    ];
    for (name, value) in ratios {
        if !(0.0..=1.0).contains(&value) {
            return Err(AimemError::ValidationError(format!(
                "threshold '{}' must be within [0, 1], got {}",
                name, value
            )));
        }
    }
    if t.partial_match > t.vindication {
        return Err(AimemError::ValidationError(
            "threshold 'partial_match' must not exceed 'vindication'".to_string(),
        ));
    }
    Ok(())
}
