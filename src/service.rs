use crate::config::ServiceConfig;
use crate::process::{CommandSpec, ProcessRunner};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Stops and restarts the system services that hold camera devices open.
///
/// Both operations are best-effort: failures are logged and never abort a
/// capture sequence.
#[derive(Clone)]
pub struct ServiceController {
    runner: Arc<dyn ProcessRunner>,
    command: Vec<String>,
    timeout: Duration,
}

impl ServiceController {
    pub fn new(runner: Arc<dyn ProcessRunner>, config: &ServiceConfig) -> Self {
        Self {
            runner,
            command: config.command.clone(),
            timeout: config.timeout(),
        }
    }

    fn command(&self, action: &str, service: &str) -> CommandSpec {
        let (program, prefix) = match self.command.split_first() {
            Some((program, prefix)) => (program.as_str(), prefix),
            None => ("systemctl", &[][..]),
        };
        CommandSpec::new(program)
            .args(prefix.iter().cloned())
            .arg(action)
            .arg(service)
    }

    async fn control(&self, action: &str, service: &str) -> bool {
        let command = self.command(action, service);
        debug!("Service control: {}", command);

        let outcome = self.runner.run(&command, self.timeout).await;
        if outcome.success() {
            info!("Service {} {}: ok", service, action);
            true
        } else {
            warn!(
                "Failed to {} service {}: {}",
                action,
                service,
                outcome.message()
            );
            false
        }
    }

    pub async fn stop(&self, service: &str) -> bool {
        self.control("stop", service).await
    }

    pub async fn restart(&self, service: &str) -> bool {
        self.control("restart", service).await
    }

    /// Run `body` with `services` stopped.
    ///
    /// Services are stopped in order, the device is given `settle` to be
    /// released, and every service is restarted in the same order once the
    /// body finishes. If the returned future is dropped before that point,
    /// the restarts are spawned onto the runtime instead.
    pub async fn bracket<F, T>(&self, services: &[String], settle: Duration, body: F) -> T
    where
        F: Future<Output = T>,
    {
        if services.is_empty() {
            return body.await;
        }

        let guard = ServiceBracket {
            controller: self.clone(),
            services: services.to_vec(),
            armed: true,
        };

        for service in services {
            info!("Stopping service {} to release its device", service);
            self.stop(service).await;
        }
        if !settle.is_zero() {
            debug!("Waiting {}ms for devices to be released", settle.as_millis());
            tokio::time::sleep(settle).await;
        }

        let result = body.await;

        guard.restore().await;
        result
    }
}

struct ServiceBracket {
    controller: ServiceController,
    services: Vec<String>,
    armed: bool,
}

impl ServiceBracket {
    async fn restore(mut self) {
        self.armed = false;
        for service in &self.services {
            info!("Restarting service {}", service);
            self.controller.restart(service).await;
        }
    }
}

impl Drop for ServiceBracket {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let controller = self.controller.clone();
        let services = std::mem::take(&mut self.services);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    "Capture interrupted, restarting services in background: {:?}",
                    services
                );
                handle.spawn(async move {
                    for service in &services {
                        controller.restart(service).await;
                    }
                });
            }
            Err(_) => error!(
                "Capture interrupted outside a runtime, services left stopped: {:?}",
                services
            ),
        }
    }
}
