//! Fixed-size worker pool draining a bounded queue
//!
//! Workers live for the process lifetime and take jobs in FIFO order.
//! Backpressure is the queue itself: once `queue_size` jobs are waiting,
//! further submissions block inside their detached send tasks until a
//! worker frees a slot.

use crate::processing::Work;

/// Start `worker_count` workers over a bounded queue of `queue_size`
/// slots and return the submission side.
pub fn init_workers(
    worker_count: usize,
    queue_size: usize,
    timeout_secs: u64,
) -> async_channel::Sender<Work> {
    let (tx, rx) = async_channel::bounded(queue_size);

    for id in 0..worker_count {
        let rx: async_channel::Receiver<Work> = rx.clone();
        tokio::spawn(async move {
            while let Ok(work) = rx.recv().await {
                tracing::info!(worker = id, pending = rx.len(), "converting");
                work.process(timeout_secs).await;
            }
        });
    }

    tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::watch;

    use crate::converter::{ConversionSource, Converter};
    use crate::error::Result;
    use crate::processing::{Outcome, Work};

    /// Converter that records how many conversions run concurrently.
    struct CountingConverter {
        delay: Duration,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Converter for CountingConverter {
        async fn convert(
            &self,
            _source: &ConversionSource,
            _cancel: watch::Receiver<bool>,
        ) -> Result<Vec<u8>> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(b"%PDF-1.4".to_vec())
        }

        async fn upload_primary(&self, _pdf: &[u8]) -> Result<bool> {
            Ok(false)
        }

        async fn upload_secondary(&self, _pdf: &[u8]) -> Result<(bool, String)> {
            Ok((false, String::new()))
        }
    }

    fn source() -> ConversionSource {
        ConversionSource {
            uri: "http://example.com/a.html".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn in_flight_conversions_never_exceed_worker_count() {
        let workers = 3;
        let queue = init_workers(workers, 64, 10);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let converter = Arc::new(CountingConverter {
                delay: Duration::from_millis(30),
                in_flight: in_flight.clone(),
                max_in_flight: max_in_flight.clone(),
            });
            handles.push(Work::submit(&queue, converter, source()));
        }

        for mut handle in handles {
            assert!(matches!(handle.wait().await, Outcome::Pdf(_)));
        }

        assert!(max_in_flight.load(Ordering::SeqCst) <= workers);
        assert!(max_in_flight.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn full_queue_blocks_the_next_submission_until_a_worker_frees() {
        let queue_size = 2;
        let queue = init_workers(1, queue_size, 10);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let converter = |delay| {
            Arc::new(CountingConverter {
                delay,
                in_flight: in_flight.clone(),
                max_in_flight: max_in_flight.clone(),
            })
        };

        // One running on the worker plus queue_size waiting.
        let mut handles = Vec::new();
        for _ in 0..(queue_size + 1) {
            handles.push(Work::submit(
                &queue,
                converter(Duration::from_millis(200)),
                source(),
            ));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.len(), queue_size, "queue should be at capacity");

        // The next send waits for a slot rather than being dropped.
        let blocked = {
            let queue = queue.clone();
            let converter = converter(Duration::ZERO);
            tokio::spawn(async move {
                let mut handle = Work::submit(&queue, converter, source());
                handle.wait().await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "submission should block on a full queue");

        for mut handle in handles {
            assert!(matches!(handle.wait().await, Outcome::Pdf(_)));
        }
        assert!(matches!(blocked.await.unwrap(), Outcome::Pdf(_)));
    }

    #[tokio::test]
    async fn jobs_are_taken_in_fifo_order() {
        let queue = init_workers(1, 16, 10);
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        struct OrderedConverter {
            idx: usize,
            order: Arc<std::sync::Mutex<Vec<usize>>>,
        }

        #[async_trait]
        impl Converter for OrderedConverter {
            async fn convert(
                &self,
                _source: &ConversionSource,
                _cancel: watch::Receiver<bool>,
            ) -> Result<Vec<u8>> {
                self.order.lock().unwrap().push(self.idx);
                Ok(b"%PDF-1.4".to_vec())
            }

            async fn upload_primary(&self, _pdf: &[u8]) -> Result<bool> {
                Ok(false)
            }

            async fn upload_secondary(&self, _pdf: &[u8]) -> Result<(bool, String)> {
                Ok((false, String::new()))
            }
        }

        // Sequential submissions so the detached enqueue tasks cannot race
        // each other.
        let mut handles = Vec::new();
        for idx in 0..5 {
            let converter = Arc::new(OrderedConverter {
                idx,
                order: order.clone(),
            });
            let mut handle = Work::submit(&queue, converter, source());
            tokio::time::sleep(Duration::from_millis(10)).await;
            handles.push(tokio::spawn(async move { handle.wait().await }));
        }

        for handle in handles {
            assert!(matches!(handle.await.unwrap(), Outcome::Pdf(_)));
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
