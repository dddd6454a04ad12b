//! Backlog replay followed by live tail
//!
//! The backlog snapshot and the live subscription are taken atomically, so
//! a consumer sees every event exactly once and in broadcast order.

use crate::bus::{OpsBus, SubscriberId, Subscription};
use futures::Stream;
use opsintel_types::BusEvent;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Stream of bus events: buffered history first, then live events
///
/// Dropping the stream cancels its subscription. The stream ends if the bus
/// disconnects the subscriber for falling behind.
pub struct ReplayStream {
    backlog: VecDeque<BusEvent>,
    live: Subscription,
}

impl ReplayStream {
    pub fn open(bus: &OpsBus) -> Self {
        let (backlog, live) = bus.subscribe_with_history();
        Self {
            backlog: backlog.into(),
            live,
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.live.id()
    }

    /// Events still waiting to be replayed
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}

impl Stream for ReplayStream {
    type Item = BusEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(event) = this.backlog.pop_front() {
            return Poll::Ready(Some(event));
        }
        this.live.poll_recv(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.backlog.len(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use chrono::Utc;
    use futures::StreamExt;
    use opsintel_types::{Domain, MetricEvent, OpsEvent};
    use std::time::Duration;

    fn metric(value: f64) -> OpsEvent {
        let now = Utc::now();
        OpsEvent::Metric(MetricEvent {
            service: "pay".into(),
            domain: Domain::Infra,
            region: None,
            tenant: None,
            metric: None,
            value: Some(value),
            severity: None,
            timestamp: now,
            received_at: now,
            message: None,
        })
    }

    #[tokio::test]
    async fn test_replays_backlog_then_tails() {
        let bus = OpsBus::new(BusConfig::default());
        for v in 1..=5 {
            bus.push(metric(v as f64));
        }

        let mut stream = ReplayStream::open(&bus);
        assert_eq!(stream.backlog_len(), 5);
        bus.push(metric(6.0));

        let mut seqs = Vec::new();
        for _ in 0..6 {
            let event = tokio::time::timeout(Duration::from_secs(1), stream.next())
                .await
                .unwrap()
                .unwrap();
            seqs.push(event.seq);
        }
        assert_eq!(seqs, vec![1, 2, 3, 4, 5, 6]);

        let idle = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let bus = OpsBus::new(BusConfig::default());
        let stream = ReplayStream::open(&bus);
        assert_eq!(bus.subscriber_count(), 1);
        drop(stream);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
