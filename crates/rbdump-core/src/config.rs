//! Dump configuration

use serde::{Deserialize, Serialize};

use crate::report::{QuotePolicy, DEFAULT_ROW_CAPACITY};

/// What to do with an index file that cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Emit nothing for the entry
    Skip,
    /// Emit the row with empty path, time and size columns
    EmitBlank,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Name prefix of index files; its second character is the index marker
    pub index_prefix: String,
    /// Replaces the index marker to form the data entry name
    pub data_marker: char,
    /// Row buffer size in characters
    pub row_capacity: usize,
    pub separator: char,
    pub quote_policy: QuotePolicy,
    pub decode_policy: DecodePolicy,
    /// Leave out entries the host flags as hidden when walking deleted folders
    pub skip_hidden: bool,
    /// Refuse to enter a directory already visited in the same deleted folder
    pub guard_cycles: bool,
    /// Deepest level listed below a deleted folder (1 = its direct children)
    pub max_depth: Option<usize>,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            index_prefix: "$I".to_string(),
            data_marker: 'R',
            row_capacity: DEFAULT_ROW_CAPACITY,
            separator: ',',
            quote_policy: QuotePolicy::Never,
            decode_policy: DecodePolicy::Skip,
            skip_hidden: true,
            guard_cycles: false,
            max_depth: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_recycle_bin_layout() {
        let config = DumpConfig::default();
        assert_eq!(config.index_prefix, "$I");
        assert_eq!(config.data_marker, 'R');
        assert_eq!(config.row_capacity, 2048);
        assert_eq!(config.quote_policy, QuotePolicy::Never);
        assert!(!config.guard_cycles);
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_string(&DumpConfig::default()).unwrap();
        assert!(json.contains("\"decode_policy\":\"skip\""));
        let back: DumpConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.separator, ',');
    }
}
