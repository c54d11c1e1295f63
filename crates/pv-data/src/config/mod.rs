//! CSV reading options

use serde::{Deserialize, Serialize};

use crate::DataError;

/// How CSV files are read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter, a single ASCII character
    pub delimiter: char,

    /// Value used for an empty cell
    pub empty_cell: f64,

    /// Whether to trim whitespace before parsing a number
    pub trim_whitespace: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            empty_cell: 0.0,
            trim_whitespace: true,
        }
    }
}

impl CsvOptions {
    pub fn delimiter_byte(&self) -> Result<u8, DataError> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| DataError::InvalidOption(format!("delimiter {:?} is not ASCII", self.delimiter)))
    }

    /// Coerce a cell to a number.
    ///
    /// Empty cells become `empty_cell`, anything unparseable becomes NaN.
    pub fn coerce(&self, raw: &str) -> f64 {
        let value = if self.trim_whitespace { raw.trim() } else { raw };
        if value.is_empty() {
            return self.empty_cell;
        }
        value.parse::<f64>().unwrap_or(f64::NAN)
    }
}
