//! Remediation workflows and their state machine vocabulary
//!
//! A workflow starts `pending` and is moved by explicit transitions:
//!
//! ```text
//! simulate -> simulated
//! approve  -> approved
//! execute  -> executed
//! undo     -> undone
//! ```
//!
//! No status is terminal; an executed workflow can still be undone.

use crate::anomaly::AlertLevel;
use crate::decision::DecisionAction;
use crate::ids::WorkflowId;
use crate::TypeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Free-form action parameters (`{"replicas": 2}`)
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Lifecycle status of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Simulated,
    Approved,
    Executed,
    Undone,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Simulated => "simulated",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Executed => "executed",
            WorkflowStatus::Undone => "undone",
        }
    }

    /// Whether the remediation has run its course (executed or rolled back)
    pub fn is_settled(&self) -> bool {
        matches!(self, WorkflowStatus::Executed | WorkflowStatus::Undone)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation action a workflow proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    ScalePods,
    PurgeCache,
    RetryPayouts,
    SwitchAsrProvider,
    FreezeModel,
}

/// What the workflow acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTarget {
    pub service: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// A proposed workflow before the engine assigns identity and status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub kind: WorkflowKind,
    pub reason: String,
    pub severity: AlertLevel,
    pub target: WorkflowTarget,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

/// A workflow tracked by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowItem {
    pub id: WorkflowId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: WorkflowStatus,
    pub kind: WorkflowKind,
    pub reason: String,
    pub severity: AlertLevel,
    pub target: WorkflowTarget,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
}

impl WorkflowItem {
    /// Materialize a draft as a fresh `pending` workflow
    pub fn from_draft(draft: WorkflowDraft) -> Self {
        let now = Utc::now();
        Self {
            id: WorkflowId::generate(),
            created_at: now,
            updated_at: now,
            status: WorkflowStatus::Pending,
            kind: draft.kind,
            reason: draft.reason,
            severity: draft.severity,
            target: draft.target,
            parameters: draft.parameters,
        }
    }
}

/// An operator or automation request to move a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowTransition {
    Simulate,
    Approve,
    Execute,
    Undo,
}

impl WorkflowTransition {
    pub const ALL: [WorkflowTransition; 4] = [
        WorkflowTransition::Simulate,
        WorkflowTransition::Approve,
        WorkflowTransition::Execute,
        WorkflowTransition::Undo,
    ];

    pub fn target_status(&self) -> WorkflowStatus {
        match self {
            WorkflowTransition::Simulate => WorkflowStatus::Simulated,
            WorkflowTransition::Approve => WorkflowStatus::Approved,
            WorkflowTransition::Execute => WorkflowStatus::Executed,
            WorkflowTransition::Undo => WorkflowStatus::Undone,
        }
    }

    /// Action recorded on the audit card for this transition
    pub fn decision_action(&self) -> DecisionAction {
        match self {
            WorkflowTransition::Simulate => DecisionAction::Simulate,
            WorkflowTransition::Approve => DecisionAction::Approve,
            WorkflowTransition::Execute => DecisionAction::Execute,
            WorkflowTransition::Undo => DecisionAction::Undo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowTransition::Simulate => "simulate",
            WorkflowTransition::Approve => "approve",
            WorkflowTransition::Execute => "execute",
            WorkflowTransition::Undo => "undo",
        }
    }
}

impl fmt::Display for WorkflowTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowTransition {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownTransition(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_targets() {
        assert_eq!(
            WorkflowTransition::Simulate.target_status(),
            WorkflowStatus::Simulated
        );
        assert_eq!(
            WorkflowTransition::Approve.target_status(),
            WorkflowStatus::Approved
        );
        assert_eq!(
            WorkflowTransition::Execute.target_status(),
            WorkflowStatus::Executed
        );
        assert_eq!(WorkflowTransition::Undo.target_status(), WorkflowStatus::Undone);
    }

    #[test]
    fn test_transition_from_path_segment() {
        assert_eq!(
            "approve".parse::<WorkflowTransition>().unwrap(),
            WorkflowTransition::Approve
        );
        assert!(matches!(
            "delete".parse::<WorkflowTransition>(),
            Err(TypeError::UnknownTransition(s)) if s == "delete"
        ));
    }

    #[test]
    fn test_draft_deserializes_console_payload() {
        let draft: WorkflowDraft = serde_json::from_value(serde_json::json!({
            "kind": "switch_asr_provider",
            "reason": "asr vendor degraded",
            "severity": "warn",
            "target": { "service": "voice", "region": "eu-west" }
        }))
        .unwrap();
        assert_eq!(draft.kind, WorkflowKind::SwitchAsrProvider);
        assert_eq!(draft.target.region.as_deref(), Some("eu-west"));
        assert!(draft.parameters.is_none());

        let item = WorkflowItem::from_draft(draft);
        assert_eq!(item.status, WorkflowStatus::Pending);
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_settled_statuses() {
        assert!(WorkflowStatus::Executed.is_settled());
        assert!(WorkflowStatus::Undone.is_settled());
        assert!(!WorkflowStatus::Approved.is_settled());
    }
}
