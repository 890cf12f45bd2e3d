//! Build script documents read from a directory.

use pipegraph_core::{BuildScriptPayload, Error, Result, ScriptKind, ScriptLoader};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default directory holding `build.yaml` and `deploy.yaml`.
pub const DEFAULT_SCRIPTS_DIR: &str = "buildspec";

/// Loads script documents from YAML files in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryScriptLoader {
    root: PathBuf,
}

impl DirectoryScriptLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, kind: ScriptKind) -> PathBuf {
        self.root.join(kind.file_name())
    }
}

impl Default for DirectoryScriptLoader {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPTS_DIR)
    }
}

impl ScriptLoader for DirectoryScriptLoader {
    fn load(&self, kind: ScriptKind) -> Result<BuildScriptPayload> {
        let path = self.path_for(kind);
        debug!(path = %path.display(), script = %kind, "Loading script document");

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read {} script {}: {}",
                kind,
                path.display(),
                e
            ))
        })?;

        let value: Value = serde_yaml::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "cannot parse {} script {}: {}",
                kind,
                path.display(),
                e
            ))
        })?;

        BuildScriptPayload::from_value(kind, value)
    }
}
