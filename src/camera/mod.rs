mod store;
mod types;
#[cfg(test)]
mod tests;

pub use store::{CameraStore, JsonCameraStore};
pub use types::{validate_camera_set, Calibration, CameraConfig, CameraRecord, DeviceKind, DeviceType};
