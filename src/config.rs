//! Replay configuration

use std::path::PathBuf;

use crate::fit::DecodeOptions;
use crate::{ReplayError, Result};

/// Default published file name, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "focus.json";

/// Everything a replay run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    /// FIT files, played in order
    pub inputs: Vec<PathBuf>,
    /// Published snapshot path
    pub output: PathBuf,
    pub decode: DecodeOptions,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { inputs: Vec::new(), output: PathBuf::from(DEFAULT_OUTPUT), decode: DecodeOptions::default() }
    }
}

impl ReplayConfig {
    pub fn new(inputs: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self { inputs: inputs.into_iter().map(Into::into).collect(), ..Self::default() }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_crc_check(mut self, verify: bool) -> Self {
        self.decode.verify_crc = verify;
        self
    }

    /// Reject configurations that cannot produce a run.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(ReplayError::config("no input files given"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(ReplayError::config("output path is empty"));
        }
        if self.output.is_dir() {
            return Err(ReplayError::config(format!(
                "output path {} is a directory",
                self.output.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_publish_to_focus_json() {
        let config = ReplayConfig::new(["ride.fit"]);
        assert_eq!(config.output, PathBuf::from("focus.json"));
        assert!(config.decode.verify_crc);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_overrides() {
        let config = ReplayConfig::new(["a.fit", "b.fit"]).with_output("/tmp/out.json").with_crc_check(false);
        assert_eq!(config.inputs, vec![PathBuf::from("a.fit"), PathBuf::from("b.fit")]);
        assert_eq!(config.output, PathBuf::from("/tmp/out.json"));
        assert!(!config.decode.verify_crc);
    }

    #[test]
    fn rejects_unusable_configurations() {
        let no_inputs = ReplayConfig::new(Vec::<PathBuf>::new());
        assert!(matches!(no_inputs.validate(), Err(ReplayError::Config { .. })));

        let empty_output = ReplayConfig::new(["ride.fit"]).with_output("");
        assert!(matches!(empty_output.validate(), Err(ReplayError::Config { .. })));

        let dir = tempfile::tempdir().unwrap();
        let dir_output = ReplayConfig::new(["ride.fit"]).with_output(dir.path());
        assert!(matches!(dir_output.validate(), Err(ReplayError::Config { .. })));
    }
}
