//! Engine configuration
//!
//! Options are plain serde data so they can be read from a TOML file:
//!
//! ```toml
//! chunk_size = 512
//! write_reporting_tables = false
//! log_profile = "production"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{JdsError, JdsErrorKind};
use crate::logging_facility::Profile;

/// Largest chunk a single save transaction may cover
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JdsOptions {
    /// Maximum number of top-level instances per save transaction
    pub chunk_size: usize,

    /// Write scalar and enum collection fields
    pub write_collections: bool,

    /// Upsert rows into registered reporting tables
    pub write_reporting_tables: bool,

    /// Write created/modified timestamps to the overview table
    pub write_overview_dates: bool,

    /// Batch stored-procedure calls instead of inline upserts where the dialect allows
    pub use_stored_procedures: bool,

    pub log_profile: Profile,
}

impl Default for JdsOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_collections: true,
            write_reporting_tables: true,
            write_overview_dates: true,
            use_stored_procedures: false,
            log_profile: Profile::Development,
        }
    }
}

impl JdsOptions {
    /// Parse options from TOML text and validate them
    ///
    /// # Errors
    ///
    /// `Config` if the text is not valid TOML or a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, JdsError> {
        let options: JdsOptions = toml::from_str(text).map_err(|e| {
            JdsError::new(JdsErrorKind::Config)
                .with_op("load_options")
                .with_message(format!("Failed to parse options: {}", e))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Config` as for [`JdsOptions::from_toml_str`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, JdsError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            JdsError::new(JdsErrorKind::Io)
                .with_op("load_options")
                .with_message(format!(
                    "Failed to read options file {}: {}",
                    path.as_ref().display(),
                    e
                ))
        })?;
        Self::from_toml_str(&text)
    }

    /// # Errors
    ///
    /// `Config` if `chunk_size` is zero.
    pub fn validate(&self) -> Result<(), JdsError> {
        if self.chunk_size == 0 {
            return Err(JdsError::new(JdsErrorKind::Config)
                .with_op("load_options")
                .with_message("chunk_size must be at least 1"));
        }
        Ok(())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let options = JdsOptions::from_toml_str("").unwrap();
        assert_eq!(options, JdsOptions::default());
        assert_eq!(options.chunk_size, 1024);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let options = JdsOptions::from_toml_str(
            "chunk_size = 16\nwrite_reporting_tables = false\nlog_profile = \"production\"\n",
        )
        .unwrap();
        assert_eq!(options.chunk_size, 16);
        assert!(!options.write_reporting_tables);
        assert!(options.write_collections);
        assert_eq!(options.log_profile, Profile::Production);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = JdsOptions::from_toml_str("chunk_size = 0").unwrap_err();
        assert_eq!(err.kind(), JdsErrorKind::Config);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = JdsOptions::from_toml_str("chunk = 3").unwrap_err();
        assert_eq!(err.code(), "ERR_CONFIG");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chunk_size = 7").unwrap();
        let options = JdsOptions::from_file(file.path()).unwrap();
        assert_eq!(options.chunk_size, 7);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = JdsOptions::from_file("/definitely/not/here.toml").unwrap_err();
        assert_eq!(err.kind(), JdsErrorKind::Io);
    }
}
