//! Manual approval policy.

use serde::{Deserialize, Serialize};

use crate::TopicRef;

/// Whether a stage ends in a manual approval gate, and who gets notified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ApprovalPolicy {
    /// No approval gate.
    #[default]
    Disabled,
    /// Append an approval gate after the stage's deploy action.
    Enabled {
        /// Address notified when approval is pending.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        /// Notification channel published to when approval is pending.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<TopicRef>,
    },
}

impl ApprovalPolicy {
    /// An enabled policy that notifies a single email address.
    pub fn email(address: impl Into<String>) -> Self {
        Self::Enabled {
            email: Some(address.into()),
            topic: None,
        }
    }

    /// An enabled policy that publishes to a notification channel.
    pub fn topic(topic: impl Into<TopicRef>) -> Self {
        Self::Enabled {
            email: None,
            topic: Some(topic.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ApprovalPolicy::Enabled { .. })
    }
}
