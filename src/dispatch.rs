//! Delivery of alerts off the frame loop.
//!
//! Alerts go through a bounded queue to a worker thread that owns the
//! transport. Submitting never blocks: a full queue rejects the alert and the
//! caller decides what to do with it. Failed sends are retried by the worker
//! with exponential backoff.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use crate::alert::AlertEvent;
use crate::config::DispatchConfig;
use crate::error::Error;

/// Outbound notification channel (HTTP callback, message bus, ...).
pub trait AlertTransport: Send + 'static {
    fn send(&mut self, event: &AlertEvent) -> Result<(), Error>;
}

impl<F> AlertTransport for F
where
    F: FnMut(&AlertEvent) -> Result<(), Error> + Send + 'static,
{
    fn send(&mut self, event: &AlertEvent) -> Result<(), Error> {
        self(event)
    }
}

/// Writes every alert to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl AlertTransport for LogTransport {
    fn send(&mut self, event: &AlertEvent) -> Result<(), Error> {
        info!(
            track_id = event.track_id,
            class = ?event.class,
            speed = event.speed_kmh,
            plate = %event.plate_text,
            "alert"
        );

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    #[inline]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX))
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(c: &DispatchConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            backoff: Duration::from_millis(c.retry_backoff_ms),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
    pub retries: u64,
}

pub struct AlertDispatcher {
    tx: Option<SyncSender<AlertEvent>>,
    worker: Option<JoinHandle<DispatchStats>>,
}

impl AlertDispatcher {
    pub fn spawn<T: AlertTransport>(transport: T, config: &DispatchConfig) -> Self {
        let (tx, rx) = sync_channel(config.queue_capacity.max(1));
        let policy = RetryPolicy::from(config);

        let worker = std::thread::Builder::new()
            .name("alert-dispatch".into())
            .spawn(move || run_worker(transport, rx, policy))
            .map_err(|err| warn!("alert dispatch worker could not start: {}", err))
            .ok();

        Self {
            tx: worker.as_ref().map(|_| tx),
            worker,
        }
    }

    /// Queues an alert without blocking.
    pub fn submit(&self, event: AlertEvent) -> Result<(), Error> {
        let tx = self.tx.as_ref().ok_or(Error::QueueClosed)?;

        match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                warn!(track_id = event.track_id, "alert queue full");
                Err(Error::QueueFull(event.track_id))
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::QueueClosed),
        }
    }

    /// Queues every alert, returning how many were accepted.
    pub fn submit_all<I: IntoIterator<Item = AlertEvent>>(&self, events: I) -> usize {
        events
            .into_iter()
            .map(|e| self.submit(e))
            .filter(Result::is_ok)
            .count()
    }

    /// Stops accepting alerts, delivers what is queued and waits for the worker.
    pub fn shutdown(mut self) -> DispatchStats {
        self.finish()
    }

    fn finish(&mut self) -> DispatchStats {
        self.tx.take();

        match self.worker.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                warn!("alert dispatch worker panicked");
                DispatchStats::default()
            }
            None => DispatchStats::default(),
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        self.finish();
    }
}

fn run_worker<T: AlertTransport>(
    mut transport: T,
    rx: Receiver<AlertEvent>,
    policy: RetryPolicy,
) -> DispatchStats {
    let mut stats = DispatchStats::default();

    for event in rx {
        let mut attempt = 1;

        loop {
            match transport.send(&event) {
                Ok(()) => {
                    stats.delivered += 1;
                    break;
                }
                Err(err) if attempt < policy.max_attempts => {
                    let delay = policy.delay(attempt);
                    warn!(
                        track_id = event.track_id,
                        attempt,
                        "alert delivery failed: {}, retrying in {:?}",
                        err,
                        delay
                    );

                    stats.retries += 1;
                    attempt += 1;
                    std::thread::sleep(delay);
                }
                Err(err) => {
                    warn!(
                        track_id = event.track_id,
                        attempt, "alert dropped: {}", err
                    );

                    stats.failed += 1;
                    break;
                }
            }
        }
    }

    stats
}
