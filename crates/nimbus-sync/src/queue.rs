//! Bounded problem queue shared by every watchdog and one consumer.
//!
//! Reporting into a full queue waits for the consumer; nothing is dropped.

use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::problem::Problem;

/// Create a queue holding at most `capacity` unconsumed problems.
pub fn bounded(capacity: usize) -> (ProblemSender, ProblemReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProblemSender { tx }, ProblemReceiver { rx })
}

/// Producer side. Cheap to clone, one per watchdog.
#[derive(Debug, Clone)]
pub struct ProblemSender {
    tx: mpsc::Sender<Problem>,
}

impl ProblemSender {
    /// Enqueue `problem`, waiting while the queue is full.
    pub async fn report(&self, problem: Problem) -> SyncResult<()> {
        self.tx.send(problem).await.map_err(|_| SyncError::QueueClosed)
    }
}

/// Consumer side.
#[derive(Debug)]
pub struct ProblemReceiver {
    rx: mpsc::Receiver<Problem>,
}

impl ProblemReceiver {
    /// Next problem in submission order, `None` once every sender is gone
    /// and the queue is drained.
    pub async fn take(&mut self) -> Option<Problem> {
        self.rx.recv().await
    }

    pub fn try_take(&mut self) -> Option<Problem> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{LiveResource, ProblemKind, ResourceKind};
    use std::time::Duration;

    fn problem(raw_id: &str) -> Problem {
        Problem::new(
            ProblemKind::NotInDatabase,
            LiveResource {
                kind: ResourceKind::Hardware,
                raw_id: raw_id.into(),
                name: raw_id.into(),
            },
        )
    }

    #[tokio::test]
    async fn full_queue_blocks_until_drained() {
        let (tx, mut rx) = bounded(1);
        tx.report(problem("a")).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(50), tx.report(problem("b"))).await;
        assert!(blocked.is_err(), "report into a full queue must wait");

        let producer = tokio::spawn({
            let tx = tx.clone();
            async move { tx.report(problem("c")).await }
        });
        assert_eq!(rx.take().await.unwrap().resource().raw_id, "a");
        producer.await.unwrap().unwrap();
        assert_eq!(rx.take().await.unwrap().resource().raw_id, "c");
    }

    #[tokio::test]
    async fn fifo_across_producers() {
        let (first, mut rx) = bounded(8);
        let second = first.clone();
        first.report(problem("1")).await.unwrap();
        second.report(problem("2")).await.unwrap();
        first.report(problem("3")).await.unwrap();
        drop((first, second));

        let mut order = Vec::new();
        while let Some(p) = rx.take().await {
            order.push(p.resource().raw_id.clone());
        }
        assert_eq!(order, ["1", "2", "3"]);
    }

    #[tokio::test]
    async fn report_fails_once_consumer_is_gone() {
        let (tx, rx) = bounded(4);
        drop(rx);
        assert!(matches!(tx.report(problem("x")).await, Err(SyncError::QueueClosed)));
    }
}
