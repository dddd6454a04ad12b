//! Decision store: bounded, append-only audit ledger
//!
//! Cards are kept in append order in a ring of fixed capacity; the oldest
//! card is dropped on overflow. Each card carries the hash of the card
//! appended before it, so the retained window can be verified even after
//! eviction (the first retained card links to an evicted predecessor).

use crate::config::DecisionConfig;
use chrono::{DateTime, Utc};
use opsintel_types::{DecisionCard, DecisionId, NewDecision};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use tracing::debug;

struct Ledger {
    cards: VecDeque<DecisionCard>,
    last_hash: Option<String>,
    appended: u64,
}

/// Outcome of [`DecisionStore::verify_chain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub valid: bool,
    pub verified_entries: usize,
    pub first_invalid: Option<DecisionId>,
}

/// Append-only ring of decision cards
pub struct DecisionStore {
    config: DecisionConfig,
    ledger: Mutex<Ledger>,
}

impl DecisionStore {
    pub fn new(config: DecisionConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            config: DecisionConfig { capacity, ..config },
            ledger: Mutex::new(Ledger {
                cards: VecDeque::with_capacity(capacity),
                last_hash: None,
                appended: 0,
            }),
        }
    }

    /// Stamp and append a decision, returning the stored card
    pub fn create(&self, decision: NewDecision) -> DecisionCard {
        let mut ledger = self.ledger.lock();

        let id = DecisionId::generate();
        let created_at = Utc::now();
        let previous_hash = ledger.last_hash.clone();
        let hash = card_hash(&id, created_at, &decision, previous_hash.as_deref());

        let card = DecisionCard {
            id,
            created_at,
            actor_id: decision.actor_id,
            action: decision.action,
            resource: decision.resource,
            reference_id: decision.reference_id,
            input: decision.input,
            output: decision.output,
            explain: decision.explain,
            model_version: decision.model_version,
            previous_hash,
            hash,
        };

        ledger.last_hash = Some(card.hash.clone());
        ledger.appended += 1;
        ledger.cards.push_back(card.clone());
        while ledger.cards.len() > self.config.capacity {
            if let Some(evicted) = ledger.cards.pop_front() {
                debug!(decision_id = %evicted.id, "Decision evicted from ledger");
            }
        }

        debug!(
            decision_id = %card.id,
            action = ?card.action,
            actor = %card.actor_id,
            "Decision recorded"
        );

        card
    }

    /// Most-recent-first copies of at most `limit` cards
    pub fn list(&self, limit: usize) -> Vec<DecisionCard> {
        self.ledger
            .lock()
            .cards
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn default_list_limit(&self) -> usize {
        self.config.default_list_limit
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.lock().cards.is_empty()
    }

    /// Cards ever appended, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.ledger.lock().appended
    }

    /// Recompute every retained card's hash and check the links between them
    pub fn verify_chain(&self) -> ChainVerification {
        let ledger = self.ledger.lock();
        verify(ledger.cards.iter())
    }
}

impl Default for DecisionStore {
    fn default() -> Self {
        Self::new(DecisionConfig::default())
    }
}

fn verify<'a>(cards: impl Iterator<Item = &'a DecisionCard>) -> ChainVerification {
    let mut verified = 0;
    let mut previous: Option<&DecisionCard> = None;

    for card in cards {
        let linked = match previous {
            Some(prev) => card.previous_hash.as_deref() == Some(prev.hash.as_str()),
            None => true,
        };
        if !linked || recompute(card) != card.hash {
            return ChainVerification {
                valid: false,
                verified_entries: verified,
                first_invalid: Some(card.id.clone()),
            };
        }
        verified += 1;
        previous = Some(card);
    }

    ChainVerification {
        valid: true,
        verified_entries: verified,
        first_invalid: None,
    }
}

fn recompute(card: &DecisionCard) -> String {
    let content = NewDecision {
        actor_id: card.actor_id.clone(),
        action: card.action,
        resource: card.resource,
        reference_id: card.reference_id.clone(),
        input: card.input.clone(),
        output: card.output.clone(),
        explain: card.explain.clone(),
        model_version: card.model_version.clone(),
    };
    card_hash(
        &card.id,
        card.created_at,
        &content,
        card.previous_hash.as_deref(),
    )
}

fn card_hash(
    id: &DecisionId,
    created_at: DateTime<Utc>,
    content: &NewDecision,
    previous_hash: Option<&str>,
) -> String {
    let hash_input = format!(
        "{}{}{}{}",
        id,
        created_at.to_rfc3339(),
        serde_json::to_string(content).unwrap_or_default(),
        previous_hash.unwrap_or("")
    );

    let mut hasher = Sha256::new();
    hasher.update(hash_input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsintel_types::{DecisionAction, DecisionResource, WorkflowId};
    use proptest::prelude::*;
    use serde_json::json;

    fn decision(n: usize) -> NewDecision {
        NewDecision::new(
            "system",
            DecisionAction::Suggest,
            DecisionResource::Workflow,
            json!({ "n": n }),
        )
    }

    fn store(capacity: usize) -> DecisionStore {
        DecisionStore::new(DecisionConfig {
            capacity,
            ..DecisionConfig::default()
        })
    }

    #[test]
    fn test_create_stamps_identity_and_links() {
        let store = DecisionStore::default();
        let first = store.create(decision(0).with_reference(WorkflowId::new("wf_a")));
        let second = store.create(decision(1));

        assert!(first.id.as_str().starts_with("dc_"));
        assert_eq!(first.previous_hash, None);
        assert_eq!(second.previous_hash.as_deref(), Some(first.hash.as_str()));
        assert_eq!(first.hash.len(), 64);
        assert_eq!(first.reference_id, Some(WorkflowId::new("wf_a")));
    }

    #[test]
    fn test_list_is_most_recent_first_and_limited() {
        let store = DecisionStore::default();
        for n in 0..5 {
            store.create(decision(n));
        }
        let listed = store.list(3);
        let ns: Vec<_> = listed.iter().map(|c| c.input["n"].clone()).collect();
        assert_eq!(ns, vec![json!(4), json!(3), json!(2)]);
        assert_eq!(store.list(0).len(), 0);
        assert_eq!(store.list(100).len(), 5);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let store = DecisionStore::default();
        let first = store.create(decision(0));
        for n in 1..=200 {
            store.create(decision(n));
        }
        assert_eq!(store.len(), 200);
        assert_eq!(store.total_appended(), 201);

        let all = store.list(200);
        assert!(all.iter().all(|c| c.id != first.id));
        assert_eq!(all.last().unwrap().input["n"], 1);
        assert_eq!(store.list(store.default_list_limit()).len(), 50);
    }

    #[test]
    fn test_chain_verifies_across_eviction() {
        let store = store(3);
        for n in 0..10 {
            store.create(decision(n));
        }
        let result = store.verify_chain();
        assert!(result.valid);
        assert_eq!(result.verified_entries, 3);
    }

    #[test]
    fn test_tampered_card_breaks_chain() {
        let store = DecisionStore::default();
        for n in 0..3 {
            store.create(decision(n));
        }
        let tampered_id = {
            let mut ledger = store.ledger.lock();
            let card = &mut ledger.cards[1];
            card.actor_id = "mallory".into();
            card.id.clone()
        };

        let result = store.verify_chain();
        assert!(!result.valid);
        assert_eq!(result.verified_entries, 1);
        assert_eq!(result.first_invalid, Some(tampered_id));
    }

    #[test]
    fn test_listing_returns_copies() {
        let store = DecisionStore::default();
        store.create(decision(0));
        let mut listed = store.list(1);
        listed[0].actor_id = "changed".into();
        assert_eq!(store.list(1)[0].actor_id, "system");
        assert!(store.verify_chain().valid);
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_capacity(capacity in 1usize..32, creates in 0usize..100) {
            let store = store(capacity);
            for n in 0..creates {
                store.create(decision(n));
                prop_assert!(store.len() <= capacity);
            }
            prop_assert_eq!(store.len(), creates.min(capacity));
            prop_assert!(store.verify_chain().valid);
        }
    }
}
