//! Identifiers and opaque handles.
//!
//! None of these are generated: every identifier comes from the caller or from
//! a fixed naming template, so the same input always yields the same graph.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Identifier of a deployable unit (a stack or environment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
#[serde(transparent)]
pub struct DeployTarget(String);

/// Symbolic name of a secret in the credential store.
///
/// Only the name is ever handled; the secret value is resolved by the
/// execution service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
#[serde(transparent)]
pub struct SecretRef(String);

/// Handle to a notification channel used by approval gates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
#[serde(transparent)]
pub struct TopicRef(String);

/// Reference to the output of one action, consumed by later actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From)]
#[display("{_0}")]
#[serde(transparent)]
pub struct ArtifactToken(String);

macro_rules! string_handle {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }

                pub fn is_empty(&self) -> bool {
                    self.0.trim().is_empty()
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

string_handle!(DeployTarget, SecretRef, TopicRef, ArtifactToken);
