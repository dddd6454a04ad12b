//! Decision cards: the audit trail of suggestions and transitions

use crate::ids::{DecisionId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Actor id used for automated decisions
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Simulate,
    Approve,
    Execute,
    Undo,
    Suggest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionResource {
    Workflow,
    Anomaly,
    Prediction,
}

/// A decision before the store stamps it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDecision {
    pub actor_id: String,
    pub action: DecisionAction,
    pub resource: DecisionResource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<WorkflowId>,

    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl NewDecision {
    pub fn new(
        actor_id: impl Into<String>,
        action: DecisionAction,
        resource: DecisionResource,
        input: Value,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            action,
            resource,
            reference_id: None,
            input,
            output: None,
            explain: None,
            model_version: None,
        }
    }

    pub fn with_reference(mut self, reference_id: WorkflowId) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_explain(mut self, explain: Value) -> Self {
        self.explain = Some(explain);
        self
    }
}

/// An immutable, hash-linked audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionCard {
    pub id: DecisionId,
    pub created_at: DateTime<Utc>,
    pub actor_id: String,
    pub action: DecisionAction,
    pub resource: DecisionResource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<WorkflowId>,

    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    /// Hash of the card appended before this one (`None` for the first)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,

    /// SHA-256 (hex) over this card's content and `previous_hash`
    pub hash: String,
}
