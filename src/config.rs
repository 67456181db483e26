// src/config.rs
use crate::outcome::OutcomePolicy;

/// Configuration for a console scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Label of the console encoding, e.g. "UTF-8" or "windows-1252"
    pub encoding: String,
    pub buffer_size: usize,
    pub policy: OutcomePolicy,
    /// Keep every parsed diagnostic in the report
    pub retain_diagnostics: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            encoding: "UTF-8".to_string(),
            buffer_size: 65536, // 64KB
            policy: OutcomePolicy::default(),
            retain_diagnostics: false,
        }
    }
}
