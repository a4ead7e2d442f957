use serde::{Deserialize, Serialize};

/// One protocol-specific match condition of a [`RoutingRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Matches a REST call whose path fully matches `path` (a regex) and whose
    /// method equals `method`, ignoring case.
    Rest { path: String, method: String },
    /// Matches a message delivered to `queueName`.
    Queue {
        #[serde(rename = "queueName")]
        queue_name: String,
        /// Where to send the response when the message itself names no reply-to.
        #[serde(
            rename = "replyQueueName",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        reply_queue_name: Option<String>,
    },
}

impl Trigger {
    pub fn rest(path: impl Into<String>, method: impl Into<String>) -> Self {
        Trigger::Rest {
            path: path.into(),
            method: method.into(),
        }
    }

    pub fn queue(queue_name: impl Into<String>) -> Self {
        Trigger::Queue {
            queue_name: queue_name.into(),
            reply_queue_name: None,
        }
    }

    pub fn queue_with_reply(queue_name: impl Into<String>, reply_queue_name: impl Into<String>) -> Self {
        Trigger::Queue {
            queue_name: queue_name.into(),
            reply_queue_name: Some(reply_queue_name.into()),
        }
    }
}

/// Declarative binding from a process name to its triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRule {
    pub process_name: String,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

impl RoutingRule {
    pub fn new(process_name: impl Into<String>, triggers: Vec<Trigger>) -> Self {
        Self {
            process_name: process_name.into(),
            triggers,
        }
    }
}
