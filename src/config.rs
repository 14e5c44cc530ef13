use serde::{Deserialize, Serialize};

/// Markers used to read a protocol spreadsheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObligationParserConfig {
    /// Cell text (trimmed, exact) that precedes the protocol number.
    pub protocol_marker: String,
    /// Substring identifying the header row.
    pub header_marker: String,
    /// Case-insensitive substring marking subtotal rows in the supplier column.
    pub total_marker: String,
    /// Status given to rows without one ("not yet due").
    pub default_status: String,
}

impl Default for ObligationParserConfig {
    fn default() -> Self {
        Self {
            protocol_marker: "Nº".to_string(),
            header_marker: "FORNECEDOR".to_string(),
            total_marker: "total".to_string(),
            default_status: "A VENCER".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// First compatible candidate in pool order. Files may be reused.
    #[default]
    FirstCompatible,
    /// First compatible candidate not already handed to an earlier obligation.
    Exclusive,
}

/// Filename markers for the two file pools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileMatcherConfig {
    pub slip_markers: Vec<String>,
    pub invoice_markers: Vec<String>,
    /// Number of leading supplier characters compared against filenames.
    pub supplier_key_len: usize,
    pub strategy: MatchStrategy,
}

impl Default for FileMatcherConfig {
    fn default() -> Self {
        Self {
            slip_markers: vec!["BOLETO".to_string()],
            invoice_markers: vec!["NF".to_string(), "NOTA".to_string()],
            supplier_key_len: 6,
            strategy: MatchStrategy::FirstCompatible,
        }
    }
}

/// Locale conventions for the recipient message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MessageFormat {
    pub currency_symbol: String,
    pub thousands_separator: char,
    pub decimal_separator: char,
    pub placeholder: String,
}

impl Default for MessageFormat {
    fn default() -> Self {
        Self {
            currency_symbol: "R$".to_string(),
            thousands_separator: '.',
            decimal_separator: ',',
            placeholder: "—".to_string(),
        }
    }
}
