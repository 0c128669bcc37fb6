// SPDX-License-Identifier: MIT OR Apache-2.0
//! Formatting options for the text encoding.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options shared by the serializer and deserializer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Pad `name(tag)` so the values of a node line up in one column
    pub align_values: bool,
    /// Require each line's leading tabs to match its nesting depth.
    /// When off, any leading whitespace is accepted.
    pub strict_indentation: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            align_values: true,
            strict_indentation: true,
        }
    }
}

impl FormatOptions {
    /// Compact output, lenient input
    pub fn relaxed() -> Self {
        Self {
            align_values: false,
            strict_indentation: false,
        }
    }

    /// Load options from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let options = ron::from_str(&contents)?;
        tracing::debug!("Loaded format options from {:?}", path);
        Ok(options)
    }

    /// Save options to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Error when loading or saving [`FormatOptions`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON for these options
    #[error("Invalid options file: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Options could not be encoded
    #[error("Failed to encode options: {0}")]
    Encode(#[from] ron::Error),
}
