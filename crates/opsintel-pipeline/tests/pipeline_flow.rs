//! End-to-end: ingress -> anomaly -> workflow -> decisions, plus stream replay.

use futures::StreamExt;
use opsintel_pipeline::{IngestRequest, Pipeline, PipelineConfig, PipelineError};
use opsintel_types::{
    AlertLevel, DecisionAction, DecisionCard, OpsEvent, WorkflowDraft, WorkflowId, WorkflowKind,
    WorkflowStatus, WorkflowTarget, WorkflowTransition, SYSTEM_ACTOR,
};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sample(service: &str, value: f64) -> IngestRequest {
    IngestRequest {
        service: service.into(),
        metric: Some("latency_ms".into()),
        value: Some(value),
        ..IngestRequest::default()
    }
}

fn baseline(pipeline: &Pipeline, service: &str) {
    for i in 0..24 {
        let value = if i % 2 == 0 { 118.0 } else { 122.0 };
        pipeline.ingest(sample(service, value));
    }
}

fn manual_draft(service: &str) -> WorkflowDraft {
    WorkflowDraft {
        kind: WorkflowKind::PurgeCache,
        reason: "manual".into(),
        severity: AlertLevel::Warn,
        target: WorkflowTarget {
            service: service.into(),
            region: None,
        },
        parameters: None,
    }
}

/// Ledger entries for one workflow, oldest first
fn ledger_for(pipeline: &Pipeline, id: &WorkflowId) -> Vec<DecisionCard> {
    let mut cards: Vec<_> = pipeline
        .decisions()
        .list(usize::MAX)
        .into_iter()
        .filter(|c| c.reference_id.as_ref() == Some(id))
        .collect();
    cards.reverse();
    cards
}

fn recorded_status(card: &DecisionCard) -> String {
    card.output.as_ref().unwrap()["status"]
        .as_str()
        .unwrap()
        .to_string()
}

fn critical_alerts(pipeline: &Pipeline) -> usize {
    pipeline
        .bus()
        .recent_history()
        .iter()
        .filter(|e| matches!(&e.event, OpsEvent::Anomaly(a) if a.level == AlertLevel::Critical))
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn critical_anomaly_creates_one_workflow_and_one_suggestion() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    baseline(&pipeline, "pay");
    assert_eq!(critical_alerts(&pipeline), 0);

    pipeline.ingest(sample("pay", 900.0));
    assert_eq!(critical_alerts(&pipeline), 1);

    let workflows = pipeline.workflows().list();
    assert_eq!(workflows.len(), 1);
    let item = &workflows[0];
    assert_eq!(item.status, WorkflowStatus::Pending);
    assert_eq!(item.target.service, "pay");

    let suggestions: Vec<_> = pipeline
        .decisions()
        .list(50)
        .into_iter()
        .filter(|c| c.action == DecisionAction::Suggest)
        .collect();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].reference_id.as_ref(), Some(&item.id));
    assert_eq!(suggestions[0].explain.as_ref().unwrap()["z"], 390.0);
}

#[test]
fn operator_drives_workflow_through_every_transition() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    baseline(&pipeline, "pay");
    pipeline.ingest(sample("pay", 900.0));
    let id = pipeline.workflows().list()[0].id.clone();

    for transition in WorkflowTransition::ALL {
        pipeline
            .workflows()
            .transition(&id, transition, "oncall")
            .unwrap();
    }

    let cards: Vec<_> = pipeline
        .decisions()
        .list(50)
        .into_iter()
        .filter(|c| c.action != DecisionAction::Suggest)
        .collect();
    assert_eq!(cards.len(), 4);
    let statuses: Vec<_> = cards
        .iter()
        .rev()
        .map(|c| c.output.as_ref().unwrap()["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, vec!["simulated", "approved", "executed", "undone"]);
    assert_eq!(
        pipeline.workflows().get(&id).unwrap().status,
        WorkflowStatus::Undone
    );
    assert!(pipeline.decisions().verify_chain().valid);
}

#[test]
fn unknown_workflow_is_reported_without_side_effects() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    pipeline.ingest(sample("pay", 120.0));
    let before = pipeline.bus().stats().last_seq;

    let result = pipeline.workflows().transition(
        &WorkflowId::new("wf_nope"),
        WorkflowTransition::Execute,
        SYSTEM_ACTOR,
    );

    assert!(matches!(result, Err(PipelineError::WorkflowNotFound(_))));
    assert_eq!(pipeline.bus().stats().last_seq, before);
    assert!(pipeline.decisions().is_empty());
}

#[tokio::test]
async fn stream_replays_backlog_then_tails_live() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    // flat series: no alerts interleave with the samples
    for _ in 0..5 {
        pipeline.ingest(sample("pay", 120.0));
    }

    let mut stream = pipeline.open_stream();
    pipeline.ingest(sample("pay", 120.0));

    let mut seqs = Vec::new();
    for _ in 0..6 {
        let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream stalled")
            .expect("stream ended");
        seqs.push(event.seq);
    }
    assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn concurrent_producers_keep_a_total_order() {
    let pipeline = Arc::new(Pipeline::new(PipelineConfig::default()));
    let mut stream = pipeline.open_stream();

    let mut tasks = Vec::new();
    for worker in 0..4 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            for i in 0..25 {
                pipeline.ingest(sample(&format!("svc-{worker}"), 100.0 + i as f64));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut last = 0;
    let mut received = 0;
    while received < 100 {
        let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream stalled")
            .expect("stream ended");
        assert!(event.seq > last);
        last = event.seq;
        if matches!(event.event, OpsEvent::Metric(_)) {
            received += 1;
        }
    }
}

#[test]
fn concurrent_transitions_are_audited_in_request_order() {
    let pipeline = Arc::new(Pipeline::new(PipelineConfig::default()));
    let ids: Vec<WorkflowId> = (0..8)
        .map(|n| pipeline.workflows().create(manual_draft(&format!("svc-{n}"))).id)
        .collect();

    let threads: Vec<_> = ids
        .iter()
        .cloned()
        .enumerate()
        .map(|(n, id)| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || {
                let actor = format!("operator-{n}");
                for transition in WorkflowTransition::ALL {
                    pipeline
                        .workflows()
                        .transition(&id, transition, &actor)
                        .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    for (n, id) in ids.iter().enumerate() {
        let cards = ledger_for(&pipeline, id);
        assert_eq!(cards[0].action, DecisionAction::Suggest);
        let statuses: Vec<_> = cards[1..].iter().map(recorded_status).collect();
        assert_eq!(statuses, vec!["simulated", "approved", "executed", "undone"]);
        assert!(cards[1..].iter().all(|c| c.actor_id == format!("operator-{n}")));
    }

    let chain = pipeline.decisions().verify_chain();
    assert!(chain.valid);
    assert_eq!(chain.verified_entries, 8 + 8 * 4);
}

#[test]
fn racing_transitions_on_one_workflow_leave_ledger_and_state_in_agreement() {
    let pipeline = Arc::new(Pipeline::new(PipelineConfig::default()));

    for round in 0..16 {
        let id = pipeline
            .workflows()
            .create(manual_draft(&format!("race-{round}")))
            .id;

        let threads: Vec<_> = WorkflowTransition::ALL
            .into_iter()
            .map(|transition| {
                let pipeline = pipeline.clone();
                let id = id.clone();
                std::thread::spawn(move || {
                    pipeline
                        .workflows()
                        .transition(&id, transition, SYSTEM_ACTOR)
                        .unwrap();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        // the newest ledger entry is the transition applied last
        let cards = ledger_for(&pipeline, &id);
        assert_eq!(cards.len(), 5);
        let final_status = pipeline.workflows().get(&id).unwrap().status;
        assert_eq!(recorded_status(cards.last().unwrap()), final_status.as_str());
    }

    assert!(pipeline.decisions().verify_chain().valid);
}
