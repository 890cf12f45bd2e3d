//! Build script payloads and their loader.
//!
//! A payload is an opaque key/value document handed to the build service
//! verbatim. The builder never looks inside it.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::{Error, Result};

/// The two fixed script documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    #[display("build")]
    Build,
    #[display("deploy")]
    Deploy,
}

impl ScriptKind {
    pub const ALL: [ScriptKind; 2] = [ScriptKind::Build, ScriptKind::Deploy];

    /// File name of this document inside a script directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptKind::Build => "build.yaml",
            ScriptKind::Deploy => "deploy.yaml",
        }
    }
}

/// A structured script document (a top-level mapping).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildScriptPayload(Map<String, Value>);

impl BuildScriptPayload {
    /// Wrap a parsed document, rejecting anything that is not a mapping.
    pub fn from_value(kind: ScriptKind, value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Configuration(format!(
                "{} script must be a mapping, found {}",
                kind,
                value_kind(&other)
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

/// Source of the build and deploy script documents.
pub trait ScriptLoader {
    /// Load and parse one script document.
    fn load(&self, kind: ScriptKind) -> Result<BuildScriptPayload>;
}

impl<L: ScriptLoader + ?Sized> ScriptLoader for &L {
    fn load(&self, kind: ScriptKind) -> Result<BuildScriptPayload> {
        (**self).load(kind)
    }
}

/// In-memory script documents.
#[derive(Debug, Clone, Default)]
pub struct StaticScripts {
    scripts: HashMap<ScriptKind, Value>,
}

impl StaticScripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: ScriptKind, document: Value) -> Self {
        self.scripts.insert(kind, document);
        self
    }
}

impl ScriptLoader for StaticScripts {
    fn load(&self, kind: ScriptKind) -> Result<BuildScriptPayload> {
        let value = self
            .scripts
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("no {} script registered", kind)))?;
        BuildScriptPayload::from_value(kind, value)
    }
}
