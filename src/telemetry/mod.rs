//! Latest inertial sample shared between the telemetry feed and capture sequences.
//!
//! Only the most recent sample is kept. The subscriber task overwrites it on every
//! accepted message and capture paths take a copy under the same lock, so a reader
//! never observes roll from one message and pitch from another.

mod subscriber;

pub use subscriber::TelemetrySubscriber;

use crate::error::TelemetryError;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tracing::debug;

/// Most recent orientation report from the IMU.
///
/// Orientation values are kept exactly as received so that a non-numeric
/// report still reaches the embedder, which decides how to treat it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySample {
    pub roll: Option<Value>,
    pub pitch: Option<Value>,
    pub yaw: Option<Value>,
    /// Wall-clock ingestion time, seconds since the UNIX epoch
    pub timestamp: Option<f64>,
    /// Monotonic ingestion time used for staleness checks
    pub received_at: Option<Instant>,
}

impl TelemetrySample {
    /// True when the sensor has not reported anything yet
    pub fn is_empty(&self) -> bool {
        self.roll.is_none() && self.pitch.is_none() && self.yaw.is_none()
    }

    pub fn age(&self) -> Option<Duration> {
        self.received_at.map(|at| at.elapsed())
    }
}

/// Single-slot, mutex-guarded telemetry cache
#[derive(Debug, Clone, Default)]
pub struct TelemetryCache {
    inner: Arc<Mutex<TelemetrySample>>,
    updated: Arc<Notify>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached orientation and stamp the ingestion time
    pub fn update(&self, roll: Value, pitch: Value, yaw: Value) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        {
            let mut sample = self.inner.lock();
            sample.roll = non_null(roll);
            sample.pitch = non_null(pitch);
            sample.yaw = non_null(yaw);
            sample.timestamp = Some(timestamp);
            sample.received_at = Some(Instant::now());
        }

        self.updated.notify_waiters();
    }

    /// Consistent copy of the latest sample
    pub fn read(&self) -> TelemetrySample {
        self.inner.lock().clone()
    }

    /// Apply one feed message.
    ///
    /// Returns `Ok(false)` when the message lacks any of roll, pitch or yaw;
    /// such messages leave the cache untouched.
    pub fn ingest(&self, payload: &[u8]) -> Result<bool, TelemetryError> {
        let message: Value = serde_json::from_slice(payload)?;
        let Value::Object(mut fields) = message else {
            return Err(TelemetryError::NotAnObject);
        };

        match (
            fields.remove("roll"),
            fields.remove("pitch"),
            fields.remove("yaw"),
        ) {
            (Some(roll), Some(pitch), Some(yaw)) => {
                self.update(roll, pitch, yaw);
                Ok(true)
            }
            _ => {
                debug!("Ignoring telemetry message without roll/pitch/yaw");
                Ok(false)
            }
        }
    }

    /// Wait until a sample with orientation data is cached, up to `timeout`
    pub async fn wait_for_sample(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.updated.notified();
            tokio::pin!(notified);
            // Register before checking so an update in between is not missed
            notified.as_mut().enable();

            if !self.read().is_empty() {
                return true;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return !self.read().is_empty();
            }
        }
    }
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}
