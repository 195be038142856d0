use crate::process::{CommandSpec, ProcessOutcome, ProcessRunner};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Stderr fragments that mean another process owns the device
const BUSY_MARKERS: [&str; 3] = ["busy", "resource temporarily unavailable", "eagain"];

/// Asks the device for its control list to see whether it is held elsewhere
pub struct DeviceBusyProbe {
    runner: Arc<dyn ProcessRunner>,
    tool: String,
    timeout: Duration,
}

impl DeviceBusyProbe {
    pub fn new(runner: Arc<dyn ProcessRunner>, tool: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            tool: tool.into(),
            timeout,
        }
    }

    /// Whether the device appears to be owned by another process.
    ///
    /// Timeouts and tool failures count as busy. A non-zero exit that does not
    /// mention contention counts as not busy; the capture attempt that follows
    /// reports its own error in that case.
    pub async fn is_busy(&self, device_path: &str) -> bool {
        let command = CommandSpec::new(self.tool.as_str()).args(["-d", device_path, "--list-controls"]);
        info!("Checking if device {} is busy", device_path);

        match self.runner.run(&command, self.timeout).await {
            ProcessOutcome::Completed { code: Some(0), .. } => {
                info!("Device {} is not busy", device_path);
                false
            }
            ProcessOutcome::Completed { code, stderr, .. } => {
                let stderr_lower = stderr.to_lowercase();
                if BUSY_MARKERS.iter().any(|marker| stderr_lower.contains(marker)) {
                    warn!("Device {} reported busy: {}", device_path, stderr.trim());
                    true
                } else {
                    // May hide a real device fault; the capture will surface it
                    warn!(
                        "Busy check on {} failed (code {:?}): {}",
                        device_path,
                        code,
                        stderr.trim()
                    );
                    false
                }
            }
            ProcessOutcome::TimedOut { .. } => {
                error!("Timeout checking if device {} is busy", device_path);
                true
            }
            ProcessOutcome::NotFound { program } => {
                error!("{} not found for busy check; assuming device is busy", program);
                true
            }
            ProcessOutcome::Failed { details } => {
                error!("Error checking if device {} is busy: {}", device_path, details);
                true
            }
        }
    }
}
