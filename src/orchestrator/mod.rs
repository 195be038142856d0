//! Capture sequencing across single cameras and camera sets.
//!
//! Every orchestration call holds the device lock for its whole duration, so
//! no two device captures ever run at the same time even when several callers
//! share one orchestrator.

mod batch;
mod sequence;
mod types;


pub use types::{CaptureKind, CaptureOutcome, CaptureState};

use crate::config::CamsnapConfig;
use crate::device::{CaptureInvoker, DeviceBusyProbe};
use crate::metadata::MetadataEmbedder;
use crate::process::ProcessRunner;
use crate::service::ServiceController;
use crate::telemetry::TelemetryCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub struct CaptureOrchestrator {
    telemetry: TelemetryCache,
    probe: DeviceBusyProbe,
    invoker: CaptureInvoker,
    services: ServiceController,
    embedder: MetadataEmbedder,
    device_lock: Mutex<()>,
    snapshot_dir: PathBuf,
    capture_timeout: Duration,
    min_file_size: u64,
    probe_before_capture: bool,
    inter_camera_delay: Duration,
    single_settle: Duration,
    batch_settle: Duration,
}

impl CaptureOrchestrator {
    pub fn new(
        config: &CamsnapConfig,
        runner: Arc<dyn ProcessRunner>,
        telemetry: TelemetryCache,
    ) -> Self {
        Self {
            telemetry,
            probe: DeviceBusyProbe::new(
                runner.clone(),
                config.capture.tool.clone(),
                config.capture.probe_timeout(),
            ),
            invoker: CaptureInvoker::new(runner.clone(), config.capture.tool.clone()),
            services: ServiceController::new(runner, &config.services),
            embedder: MetadataEmbedder::new(
                Some(config.telemetry.software_tag.clone()),
                config.telemetry.max_age(),
            ),
            device_lock: Mutex::new(()),
            snapshot_dir: PathBuf::from(&config.storage.snapshot_dir),
            capture_timeout: config.capture.timeout(),
            min_file_size: config.capture.min_file_size,
            probe_before_capture: config.capture.probe_before_capture,
            inter_camera_delay: config.capture.inter_camera_delay(),
            single_settle: config.services.single_settle(),
            batch_settle: config.services.batch_settle(),
        }
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    pub fn telemetry(&self) -> &TelemetryCache {
        &self.telemetry
    }
}
