//! A single in-flight conversion job and its outcome channels
//!
//! A job is split into two halves. [`Work`] travels through the queue to
//! a worker and carries the sender side of each outcome channel plus the
//! receiver side of the cancel channel. [`WorkHandle`] stays with the
//! dispatcher and multiplexes the receiver sides; dropping it cancels
//! the job. Every outcome channel is a 1-slot buffer so producers never
//! block on a dispatcher that has already moved on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::converter::{wait_cancelled, ConversionSource, Converter};
use crate::error::Error;

/// What the dispatcher observed for one job.
#[derive(Debug)]
pub enum Outcome {
    /// Primary store received the PDF
    Uploaded,
    /// Inline PDF bytes
    Pdf(Vec<u8>),
    /// Secondary store retrieval URL
    Url(String),
    /// Conversion or upload error, timeout included
    Error(Error),
}

/// Queue-side half of a job.
pub struct Work {
    converter: Arc<dyn Converter>,
    source: ConversionSource,
    out_tx: mpsc::Sender<Vec<u8>>,
    url_tx: mpsc::Sender<String>,
    err_tx: mpsc::Sender<Error>,
    uploaded_tx: mpsc::Sender<()>,
    cancel_rx: watch::Receiver<bool>,
}

/// Dispatcher-side half of a job.
///
/// Dropping the handle before an outcome flips the cancel channel; the
/// worker and its subordinate task observe it and stop publishing.
pub struct WorkHandle {
    out_rx: mpsc::Receiver<Vec<u8>>,
    url_rx: mpsc::Receiver<String>,
    err_rx: mpsc::Receiver<Error>,
    uploaded_rx: mpsc::Receiver<()>,
    cancel_tx: watch::Sender<bool>,
}

impl Work {
    /// Build a job and enqueue it from a detached task.
    ///
    /// The detached send keeps the dispatcher free to observe a client
    /// disconnect while the queue is full. A handle dropped before the
    /// send completes leaves a cancelled Work in the queue; the worker
    /// that picks it up observes the cancel immediately and discards it.
    pub fn submit(
        queue: &async_channel::Sender<Work>,
        converter: Arc<dyn Converter>,
        source: ConversionSource,
    ) -> WorkHandle {
        let (out_tx, out_rx) = mpsc::channel(1);
        let (url_tx, url_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(1);
        let (uploaded_tx, uploaded_rx) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let work = Work {
            converter,
            source,
            out_tx,
            url_tx,
            err_tx,
            uploaded_tx,
            cancel_rx,
        };

        let queue = queue.clone();
        tokio::spawn(async move {
            if queue.send(work).await.is_err() {
                tracing::error!("work queue is closed; job dropped");
            }
        });

        WorkHandle {
            out_rx,
            url_rx,
            err_rx,
            uploaded_rx,
            cancel_tx,
        }
    }

    /// Run the job on a worker under the given deadline.
    ///
    /// A subordinate task drives convert and the upload chain; the first
    /// event among {cancel, uploaded, bytes, url, error, timer} wins and
    /// is forwarded to the dispatcher. Returning drops the process-local
    /// cancel sender, which the converter observes, so a child process or
    /// remote call still running after a timeout is reclaimed here.
    pub async fn process(self, timeout_secs: u64) {
        let Work {
            converter,
            source,
            out_tx,
            url_tx,
            err_tx,
            uploaded_tx,
            cancel_rx,
        } = self;

        let (local_cancel_tx, local_cancel_rx) = watch::channel(false);
        let (wout_tx, mut wout_rx) = mpsc::channel::<Vec<u8>>(1);
        let (wurl_tx, mut wurl_rx) = mpsc::channel::<String>(1);
        let (werr_tx, mut werr_rx) = mpsc::channel::<Error>(1);
        let (wup_tx, mut wup_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let pdf = match converter.convert(&source, local_cancel_rx).await {
                Ok(pdf) => pdf,
                Err(err) => {
                    let _ = werr_tx.try_send(err);
                    return;
                }
            };

            match converter.upload_primary(&pdf).await {
                Ok(true) => {
                    let _ = wup_tx.try_send(());
                    return;
                }
                Ok(false) => {}
                Err(err) => {
                    let _ = werr_tx.try_send(err);
                    return;
                }
            }

            match converter.upload_secondary(&pdf).await {
                Ok((true, url)) => {
                    let _ = wurl_tx.try_send(url);
                    return;
                }
                Ok((false, _)) => {}
                Err(err) => {
                    let _ = werr_tx.try_send(err);
                    return;
                }
            }

            let _ = wout_tx.try_send(pdf);
        });

        let mut cancel = cancel_rx;
        tokio::select! {
            _ = wait_cancelled(&mut cancel) => {
                tracing::debug!("job cancelled by dispatcher");
            }
            Some(()) = wup_rx.recv() => {
                let _ = uploaded_tx.try_send(());
            }
            Some(out) = wout_rx.recv() => {
                let _ = out_tx.try_send(out);
            }
            Some(url) = wurl_rx.recv() => {
                let _ = url_tx.try_send(url);
            }
            Some(err) = werr_rx.recv() => {
                let _ = err_tx.try_send(err);
            }
            _ = tokio::time::sleep(Duration::from_secs(timeout_secs)) => {
                let _ = err_tx.try_send(Error::ConversionTimeout);
            }
        }

        drop(local_cancel_tx);
    }
}

impl WorkHandle {
    /// Wait for the job's single observable outcome.
    pub async fn wait(&mut self) -> Outcome {
        tokio::select! {
            Some(()) = self.uploaded_rx.recv() => Outcome::Uploaded,
            Some(out) = self.out_rx.recv() => Outcome::Pdf(out),
            Some(url) = self.url_rx.recv() => Outcome::Url(url),
            Some(err) = self.err_rx.recv() => Outcome::Error(err),
            else => Outcome::Error(Error::Cancelled),
        }
    }

    /// Cancel the job. Idempotent; also triggered by dropping the handle.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

impl Drop for WorkHandle {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::error::Result;
    use crate::processing::init_workers;

    /// Scriptable converter for exercising the dispatch core.
    struct MockConverter {
        convert_delay: Duration,
        convert_fails: bool,
        primary_uploaded: bool,
        secondary: Option<String>,
        cancel_observed: Arc<Notify>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl Default for MockConverter {
        fn default() -> Self {
            Self {
                convert_delay: Duration::ZERO,
                convert_fails: false,
                primary_uploaded: false,
                secondary: None,
                cancel_observed: Arc::new(Notify::new()),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Converter for MockConverter {
        async fn convert(
            &self,
            _source: &ConversionSource,
            mut cancel: watch::Receiver<bool>,
        ) -> Result<Vec<u8>> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let result = tokio::select! {
                _ = tokio::time::sleep(self.convert_delay) => {
                    if self.convert_fails {
                        Err(Error::ConverterFailure {
                            stderr: "mock failure".into(),
                            code: 1,
                        })
                    } else {
                        Ok(b"%PDF-1.4 mock".to_vec())
                    }
                }
                _ = wait_cancelled(&mut cancel) => {
                    self.cancel_observed.notify_one();
                    Err(Error::Cancelled)
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }

        async fn upload_primary(&self, _pdf: &[u8]) -> Result<bool> {
            Ok(self.primary_uploaded)
        }

        async fn upload_secondary(&self, _pdf: &[u8]) -> Result<(bool, String)> {
            match &self.secondary {
                Some(url) => Ok((true, url.clone())),
                None => Ok((false, String::new())),
            }
        }
    }

    fn source() -> ConversionSource {
        ConversionSource {
            uri: "http://example.com/a.html".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn inline_bytes_when_no_store_is_configured() {
        let queue = init_workers(2, 8, 5);
        let mut handle = Work::submit(&queue, Arc::new(MockConverter::default()), source());
        match handle.wait().await {
            Outcome::Pdf(out) => assert!(out.starts_with(b"%PDF")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn uploaded_signal_when_primary_store_succeeds() {
        let queue = init_workers(2, 8, 5);
        let converter = MockConverter {
            primary_uploaded: true,
            ..Default::default()
        };
        let mut handle = Work::submit(&queue, Arc::new(converter), source());
        assert!(matches!(handle.wait().await, Outcome::Uploaded));
    }

    #[tokio::test]
    async fn url_outcome_when_secondary_store_succeeds() {
        let queue = init_workers(2, 8, 5);
        let converter = MockConverter {
            secondary: Some("https://cdn/x.pdf".into()),
            ..Default::default()
        };
        let mut handle = Work::submit(&queue, Arc::new(converter), source());
        match handle.wait().await {
            Outcome::Url(url) => assert_eq!(url, "https://cdn/x.pdf"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn converter_error_reaches_the_dispatcher() {
        let queue = init_workers(2, 8, 5);
        let converter = MockConverter {
            convert_fails: true,
            ..Default::default()
        };
        let mut handle = Work::submit(&queue, Arc::new(converter), source());
        match handle.wait().await {
            Outcome::Error(Error::ConverterFailure { code, .. }) => assert_eq!(code, 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_wins_over_a_slow_converter() {
        let queue = init_workers(1, 8, 1);
        let converter = MockConverter {
            convert_delay: Duration::from_secs(10),
            ..Default::default()
        };
        let started = Instant::now();
        let mut handle = Work::submit(&queue, Arc::new(converter), source());
        match handle.wait().await {
            Outcome::Error(Error::ConversionTimeout) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn dropped_handle_cancels_a_running_conversion() {
        let queue = init_workers(1, 8, 30);
        let converter = MockConverter {
            convert_delay: Duration::from_secs(30),
            ..Default::default()
        };
        let observed = converter.cancel_observed.clone();
        let handle = Work::submit(&queue, Arc::new(converter), source());

        // Let the worker pick the job up, then walk away.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(handle);

        tokio::time::timeout(Duration::from_millis(100), observed.notified())
            .await
            .expect("converter did not observe cancel within 100ms");
    }

    #[tokio::test]
    async fn cancelled_work_in_queue_is_discarded_without_converting() {
        let queue = init_workers(1, 8, 5);
        let converter = Arc::new(MockConverter::default());
        let in_flight = converter.in_flight.clone();

        let handle = Work::submit(&queue, converter, source());
        drop(handle);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exactly_one_outcome_under_randomized_latency() {
        let queue = init_workers(4, 64, 5);
        for round in 0..100u64 {
            let converter = MockConverter {
                convert_delay: Duration::from_millis(round % 7),
                primary_uploaded: round % 3 == 0,
                secondary: (round % 3 == 1).then(|| "https://cdn/x.pdf".to_string()),
                ..Default::default()
            };
            let mut handle = Work::submit(&queue, Arc::new(converter), source());
            // First outcome is the only one; a second wait never yields a
            // success variant because every producer slot is spent.
            let first = handle.wait().await;
            assert!(!matches!(first, Outcome::Error(Error::Cancelled)));
            let second =
                tokio::time::timeout(Duration::from_millis(20), handle.wait()).await;
            match second {
                Err(_) => {}
                Ok(Outcome::Error(Error::Cancelled)) => {}
                Ok(other) => panic!("second outcome observed: {other:?}"),
            }
        }
    }
}
