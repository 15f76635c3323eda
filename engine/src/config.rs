use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the search engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the searchable documents
    pub root_dir: PathBuf,

    /// Maximum number of files scanned concurrently per search
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration. Called at engine construction; a failure here
    /// is fatal, there is no runtime recovery from a bad config.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(EngineError::Config(
                "max_concurrent must be positive".to_string(),
            ));
        }

        if !self.root_dir.is_dir() {
            return Err(EngineError::Config(format!(
                "root directory does not exist or is not a directory: {}",
                self.root_dir.display()
            )));
        }

        Ok(())
    }
}
