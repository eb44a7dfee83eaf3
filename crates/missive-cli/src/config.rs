use std::path::PathBuf;

use anyhow::{Context, Result};

use missive_core::ThreadDepth;

/// Runtime settings, read from the environment (and `.env`) and then
/// overridden by command-line flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub thread_depth: ThreadDepth,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("MISSIVE_DB_PATH").unwrap_or_else(|| "missive.db".into());
        let thread_depth = match lookup("MISSIVE_THREAD_DEPTH") {
            Some(raw) => raw
                .parse::<ThreadDepth>()
                .with_context(|| format!("MISSIVE_THREAD_DEPTH must be a number, got '{}'", raw))?,
            None => ThreadDepth::default(),
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            thread_depth,
        })
    }

    pub fn with_overrides(mut self, db_path: Option<PathBuf>, thread_depth: Option<ThreadDepth>) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        if let Some(depth) = thread_depth {
            self.thread_depth = depth;
        }
        self
    }
}
