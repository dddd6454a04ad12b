//! Workflow engine: remediation state machine
//!
//! Every state change is recorded as a decision card while the engine's
//! lock is held, so the decision store's append order matches the order in
//! which transitions were applied. The matching `workflow.<status>` event is
//! pushed after the lock is released, so hooks and subscribers can call back
//! into the engine.

use crate::bus::OpsBus;
use crate::config::WorkflowConfig;
use crate::decisions::DecisionStore;
use crate::error::{PipelineError, PipelineResult};
use chrono::Utc;
use opsintel_types::{
    AnomalyAlert, DecisionAction, DecisionResource, Domain, NewDecision, OpsEvent, Parameters,
    WorkflowDraft, WorkflowId, WorkflowItem, WorkflowKind, WorkflowStatus, WorkflowTarget,
    WorkflowTransition, SYSTEM_ACTOR,
};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Source recorded on suggest decisions
pub const SUGGEST_SOURCE: &str = "anomaly_detector";

/// Metric names with a dedicated remediation
const LATENCY_METRIC: &str = "latency_ms";
const ERROR_RATE_METRIC: &str = "error_rate_pct";

/// Map an anomaly to the remediation an operator would most likely reach for
pub fn suggest_from_anomaly(alert: &AnomalyAlert) -> WorkflowDraft {
    let (kind, parameters) = match alert.metric.as_deref() {
        Some(LATENCY_METRIC) => {
            let mut parameters = Parameters::new();
            parameters.insert("replicas".into(), json!(2));
            (WorkflowKind::ScalePods, Some(parameters))
        }
        Some(ERROR_RATE_METRIC) => (WorkflowKind::PurgeCache, None),
        _ if alert.domain == Domain::Ai => (WorkflowKind::FreezeModel, None),
        _ => (WorkflowKind::PurgeCache, None),
    };

    WorkflowDraft {
        kind,
        reason: alert.reason.clone(),
        severity: alert.level,
        target: WorkflowTarget {
            service: alert.service.clone(),
            region: alert.region.clone(),
        },
        parameters,
    }
}

struct Tracked {
    seq: u64,
    item: WorkflowItem,
}

#[derive(Default)]
struct WorkflowTable {
    items: HashMap<WorkflowId, Tracked>,
    next_seq: u64,
}

impl WorkflowTable {
    /// Drop the oldest settled workflow; `None` when every workflow is still open
    fn archive_oldest_settled(&mut self) -> Option<WorkflowItem> {
        let oldest = self
            .items
            .iter()
            .filter(|(_, tracked)| tracked.item.status.is_settled())
            .min_by_key(|(_, tracked)| tracked.seq)
            .map(|(id, _)| id.clone())?;
        self.items.remove(&oldest).map(|tracked| tracked.item)
    }
}

/// Workflow counts by lifecycle stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowStats {
    pub total: usize,
    pub open: usize,
    pub settled: usize,
    pub archived: u64,
    pub by_status: BTreeMap<WorkflowStatus, usize>,
}

/// Owns every tracked workflow
pub struct WorkflowEngine {
    config: WorkflowConfig,
    bus: OpsBus,
    decisions: Arc<DecisionStore>,
    table: RwLock<WorkflowTable>,
    archived: AtomicU64,
}

impl WorkflowEngine {
    pub fn new(config: WorkflowConfig, bus: OpsBus, decisions: Arc<DecisionStore>) -> Self {
        Self {
            config,
            bus,
            decisions,
            table: RwLock::new(WorkflowTable::default()),
            archived: AtomicU64::new(0),
        }
    }

    /// Admit a draft as a new `pending` workflow
    pub fn create(&self, draft: WorkflowDraft) -> WorkflowItem {
        self.admit(draft, json!({ "source": SUGGEST_SOURCE }))
    }

    /// Create the suggested remediation for an anomaly
    pub fn create_from_anomaly(&self, alert: &AnomalyAlert) -> WorkflowItem {
        let explain = json!({
            "source": SUGGEST_SOURCE,
            "z": alert.correlation.z,
            "metric": alert.metric,
        });
        self.admit(suggest_from_anomaly(alert), explain)
    }

    fn admit(&self, draft: WorkflowDraft, explain: Value) -> WorkflowItem {
        let item = WorkflowItem::from_draft(draft);
        let input = json!({
            "kind": item.kind,
            "reason": item.reason,
            "target": item.target,
            "parameters": item.parameters,
        });

        {
            let mut table = self.table.write();
            self.make_room(&mut table);

            table.next_seq += 1;
            let seq = table.next_seq;
            table.items.insert(
                item.id.clone(),
                Tracked {
                    seq,
                    item: item.clone(),
                },
            );

            self.decisions.create(
                NewDecision::new(
                    SYSTEM_ACTOR,
                    DecisionAction::Suggest,
                    DecisionResource::Workflow,
                    input,
                )
                .with_reference(item.id.clone())
                .with_explain(explain),
            );
        }

        info!(
            workflow_id = %item.id,
            kind = ?item.kind,
            service = %item.target.service,
            severity = %item.severity,
            "Workflow created"
        );

        self.bus
            .push(OpsEvent::workflow(WorkflowStatus::Pending, item.clone()));
        item
    }

    fn make_room(&self, table: &mut WorkflowTable) {
        if table.items.len() < self.config.max_items.max(1) {
            return;
        }
        match table.archive_oldest_settled() {
            Some(archived) => {
                self.archived.fetch_add(1, Ordering::Relaxed);
                info!(
                    workflow_id = %archived.id,
                    status = %archived.status,
                    item = %serde_json::to_string(&archived).unwrap_or_default(),
                    "Workflow archived"
                );
            }
            None => warn!(
                tracked = table.items.len(),
                max_items = self.config.max_items,
                "Workflow cap reached with no settled workflows to archive"
            ),
        }
    }

    /// Apply a transition on behalf of `actor`
    ///
    /// An unknown id leaves every component untouched and returns
    /// [`PipelineError::WorkflowNotFound`].
    pub fn transition(
        &self,
        id: &WorkflowId,
        transition: WorkflowTransition,
        actor: &str,
    ) -> PipelineResult<WorkflowItem> {
        let status = transition.target_status();

        let item = {
            let mut table = self.table.write();
            let tracked = table
                .items
                .get_mut(id)
                .ok_or_else(|| PipelineError::WorkflowNotFound(id.clone()))?;

            tracked.item.status = status;
            tracked.item.updated_at = Utc::now();
            let item = tracked.item.clone();

            self.decisions.create(
                NewDecision::new(
                    actor,
                    transition.decision_action(),
                    DecisionResource::Workflow,
                    json!({
                        "kind": item.kind,
                        "target": item.target,
                        "parameters": item.parameters,
                    }),
                )
                .with_reference(item.id.clone())
                .with_output(json!({ "status": status })),
            );
            item
        };

        info!(
            workflow_id = %item.id,
            transition = %transition,
            actor,
            "Workflow transitioned"
        );

        self.bus.push(OpsEvent::workflow(status, item.clone()));
        Ok(item)
    }

    pub fn simulate(&self, id: &WorkflowId, actor: &str) -> PipelineResult<WorkflowItem> {
        self.transition(id, WorkflowTransition::Simulate, actor)
    }

    pub fn approve(&self, id: &WorkflowId, actor: &str) -> PipelineResult<WorkflowItem> {
        self.transition(id, WorkflowTransition::Approve, actor)
    }

    pub fn execute(&self, id: &WorkflowId, actor: &str) -> PipelineResult<WorkflowItem> {
        self.transition(id, WorkflowTransition::Execute, actor)
    }

    pub fn undo(&self, id: &WorkflowId, actor: &str) -> PipelineResult<WorkflowItem> {
        self.transition(id, WorkflowTransition::Undo, actor)
    }

    pub fn get(&self, id: &WorkflowId) -> Option<WorkflowItem> {
        self.table
            .read()
            .items
            .get(id)
            .map(|tracked| tracked.item.clone())
    }

    /// All workflows, newest-created first
    pub fn list(&self) -> Vec<WorkflowItem> {
        let table = self.table.read();
        let mut tracked: Vec<&Tracked> = table.items.values().collect();
        tracked.sort_by(|a, b| b.seq.cmp(&a.seq));
        tracked.into_iter().map(|t| t.item.clone()).collect()
    }

    pub fn stats(&self) -> WorkflowStats {
        let table = self.table.read();
        let mut stats = WorkflowStats {
            total: table.items.len(),
            archived: self.archived.load(Ordering::Relaxed),
            ..WorkflowStats::default()
        };
        for tracked in table.items.values() {
            let status = tracked.item.status;
            *stats.by_status.entry(status).or_default() += 1;
            if status.is_settled() {
                stats.settled += 1;
            } else {
                stats.open += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BusConfig, DecisionConfig};
    use opsintel_types::{AlertLevel, Correlation};

    fn engine_with(max_items: usize) -> (WorkflowEngine, OpsBus, Arc<DecisionStore>) {
        let bus = OpsBus::new(BusConfig::default());
        let decisions = Arc::new(DecisionStore::new(DecisionConfig::default()));
        let engine =
            WorkflowEngine::new(WorkflowConfig { max_items }, bus.clone(), decisions.clone());
        (engine, bus, decisions)
    }

    fn engine() -> (WorkflowEngine, OpsBus, Arc<DecisionStore>) {
        engine_with(WorkflowConfig::default().max_items)
    }

    fn alert(metric: Option<&str>, domain: Domain) -> AnomalyAlert {
        AnomalyAlert {
            level: AlertLevel::Critical,
            reason: "z-score 9.00 on latency_ms".into(),
            service: "pay".into(),
            domain,
            region: Some("us-east".into()),
            value: Some(900.0),
            metric: metric.map(str::to_string),
            correlation: Correlation { z: 9.0 },
            timestamp: Utc::now(),
        }
    }

    fn draft(service: &str) -> WorkflowDraft {
        WorkflowDraft {
            kind: WorkflowKind::RetryPayouts,
            reason: "manual".into(),
            severity: AlertLevel::Warn,
            target: WorkflowTarget {
                service: service.into(),
                region: None,
            },
            parameters: None,
        }
    }

    #[test]
    fn test_suggestion_rules() {
        let latency = suggest_from_anomaly(&alert(Some("latency_ms"), Domain::Ai));
        assert_eq!(latency.kind, WorkflowKind::ScalePods);
        assert_eq!(latency.parameters.unwrap()["replicas"], 2);
        assert_eq!(latency.target.region.as_deref(), Some("us-east"));
        assert_eq!(latency.severity, AlertLevel::Critical);
        assert_eq!(latency.reason, "z-score 9.00 on latency_ms");

        let errors = suggest_from_anomaly(&alert(Some("error_rate_pct"), Domain::Ai));
        assert_eq!(errors.kind, WorkflowKind::PurgeCache);
        assert!(errors.parameters.is_none());

        let ai = suggest_from_anomaly(&alert(Some("tokens_per_s"), Domain::Ai));
        assert_eq!(ai.kind, WorkflowKind::FreezeModel);

        let other = suggest_from_anomaly(&alert(None, Domain::Financial));
        assert_eq!(other.kind, WorkflowKind::PurgeCache);
    }

    #[test]
    fn test_create_records_suggestion_and_publishes() {
        let (engine, bus, decisions) = engine();
        let item = engine.create_from_anomaly(&alert(Some("latency_ms"), Domain::Infra));

        assert_eq!(item.status, WorkflowStatus::Pending);
        assert_eq!(engine.get(&item.id), Some(item.clone()));

        let cards = decisions.list(10);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].action, DecisionAction::Suggest);
        assert_eq!(cards[0].actor_id, SYSTEM_ACTOR);
        assert_eq!(cards[0].reference_id.as_ref(), Some(&item.id));
        assert_eq!(cards[0].explain.as_ref().unwrap()["source"], SUGGEST_SOURCE);
        assert_eq!(cards[0].input["kind"], "scale_pods");

        let history = bus.recent_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event.kind(), "workflow.created");
    }

    #[test]
    fn test_full_lifecycle_records_four_transitions() {
        let (engine, bus, decisions) = engine();
        let item = engine.create(draft("payouts"));

        for transition in WorkflowTransition::ALL {
            let updated = engine.transition(&item.id, transition, "ops@example.com").unwrap();
            assert_eq!(updated.status, transition.target_status());
        }

        let cards = decisions.list(10);
        assert_eq!(cards.len(), 5);
        let transitions: Vec<_> = cards.iter().rev().skip(1).collect();
        for (card, transition) in transitions.iter().zip(WorkflowTransition::ALL) {
            assert_eq!(card.action, transition.decision_action());
            assert_eq!(card.actor_id, "ops@example.com");
            assert_eq!(
                card.output.as_ref().unwrap()["status"],
                transition.target_status().as_str()
            );
            assert_eq!(card.input["kind"], "retry_payouts");
        }

        assert_eq!(engine.get(&item.id).unwrap().status, WorkflowStatus::Undone);
        let kinds: Vec<_> = bus
            .recent_history()
            .iter()
            .map(|e| e.event.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "workflow.created",
                "workflow.simulated",
                "workflow.approved",
                "workflow.executed",
                "workflow.undone"
            ]
        );
    }

    #[test]
    fn test_unknown_id_mutates_nothing() {
        let (engine, bus, decisions) = engine();
        let result = engine.approve(&WorkflowId::new("wf_missing"), SYSTEM_ACTOR);

        assert!(matches!(
            result,
            Err(PipelineError::WorkflowNotFound(id)) if id.as_str() == "wf_missing"
        ));
        assert!(decisions.is_empty());
        assert!(bus.recent_history().is_empty());
        assert!(engine.list().is_empty());
    }

    #[test]
    fn test_list_is_newest_first() {
        let (engine, _, _) = engine();
        let first = engine.create(draft("a"));
        let second = engine.create(draft("b"));
        let third = engine.create(draft("c"));

        let ids: Vec<_> = engine.list().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn test_cap_archives_oldest_settled() {
        let (engine, _, _) = engine_with(2);
        let first = engine.create(draft("a"));
        let second = engine.create(draft("b"));
        engine.execute(&second.id, SYSTEM_ACTOR).unwrap();

        let third = engine.create(draft("c"));
        assert!(engine.get(&second.id).is_none());
        assert!(engine.get(&first.id).is_some());
        assert!(engine.get(&third.id).is_some());

        // nothing settled: grows past the cap rather than dropping open work
        let fourth = engine.create(draft("d"));
        assert!(engine.get(&fourth.id).is_some());

        let stats = engine.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.open, 3);
        assert_eq!(stats.archived, 1);
        assert_eq!(stats.by_status.get(&WorkflowStatus::Pending), Some(&3));
    }
}
