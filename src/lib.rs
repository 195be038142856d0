pub mod camera;
pub mod config;
pub mod device;
pub mod error;
pub mod exif;
pub mod metadata;
pub mod orchestrator;
pub mod process;
pub mod service;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use camera::{Calibration, CameraConfig, CameraStore, DeviceType, JsonCameraStore};
pub use config::CamsnapConfig;
pub use error::{CamsnapError, Result};
pub use metadata::{read_embedded_record, EmbedOutcome, EmbeddedMetadataRecord, MetadataEmbedder};
pub use orchestrator::{CaptureOrchestrator, CaptureOutcome, CaptureState};
pub use process::{ProcessOutcome, ProcessRunner, SystemProcessRunner};
pub use service::ServiceController;
pub use telemetry::{TelemetryCache, TelemetrySample, TelemetrySubscriber};
