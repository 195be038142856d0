use crate::error::CameraConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a camera's device is owned on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceType {
    /// Nothing else holds the device open
    AlwaysAvailable,
    /// A long-running service streams from the device and must be stopped first
    StreamInterrupt { service_name: String },
}

/// Wire form of the device type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    AlwaysAvailable,
    StreamInterrupt,
}

/// Fixed per-camera correction added to raw sensor orientation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    pub roll_offset: f64,
    pub pitch_offset: f64,
    pub yaw_offset: f64,
}

/// A validated camera entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CameraRecord", into = "CameraRecord")]
pub struct CameraConfig {
    pub name: String,
    pub device_path: String,
    pub device_type: DeviceType,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    pub stereo: bool,
    pub calibration: Calibration,
}

/// Persisted camera record as stored in the camera list file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub device_path: String,
    #[serde(rename = "type")]
    pub device_type: DeviceKind,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
    #[serde(default)]
    pub stereo: bool,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub roll_offset: f64,
    #[serde(default)]
    pub pitch_offset: f64,
    #[serde(default)]
    pub yaw_offset: f64,
}

impl CameraConfig {
    /// Service that must be stopped around a capture, if any
    pub fn service_name(&self) -> Option<&str> {
        match &self.device_type {
            DeviceType::AlwaysAvailable => None,
            DeviceType::StreamInterrupt { service_name } => Some(service_name),
        }
    }

    pub fn requires_interrupt(&self) -> bool {
        self.service_name().is_some()
    }
}

impl TryFrom<CameraRecord> for CameraConfig {
    type Error = CameraConfigError;

    fn try_from(record: CameraRecord) -> Result<Self, Self::Error> {
        let name = record.name.trim().to_string();
        if name.is_empty() {
            return Err(CameraConfigError::MissingField { field: "name" });
        }

        let device_path = record.device_path.trim().to_string();
        if device_path.is_empty() {
            return Err(CameraConfigError::MissingField {
                field: "device_path",
            });
        }

        if record.width == 0 || record.height == 0 {
            return Err(CameraConfigError::InvalidResolution {
                name,
                width: record.width,
                height: record.height,
            });
        }

        let pixel_format = record.pixel_format.trim().to_uppercase();
        if pixel_format.is_empty() {
            return Err(CameraConfigError::MissingField {
                field: "pixel_format",
            });
        }

        // An empty service name is how the settings form stores "none"
        let service_name = record
            .service_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let device_type = match (record.device_type, service_name) {
            (DeviceKind::StreamInterrupt, Some(service_name)) => {
                DeviceType::StreamInterrupt { service_name }
            }
            (DeviceKind::StreamInterrupt, None) => {
                return Err(CameraConfigError::MissingServiceName { name });
            }
            (DeviceKind::AlwaysAvailable, Some(service_name)) => {
                return Err(CameraConfigError::UnexpectedServiceName { name, service_name });
            }
            (DeviceKind::AlwaysAvailable, None) => DeviceType::AlwaysAvailable,
        };

        Ok(Self {
            name,
            device_path,
            device_type,
            width: record.width,
            height: record.height,
            pixel_format,
            stereo: record.stereo,
            calibration: Calibration {
                roll_offset: record.roll_offset,
                pitch_offset: record.pitch_offset,
                yaw_offset: record.yaw_offset,
            },
        })
    }
}

impl From<CameraConfig> for CameraRecord {
    fn from(camera: CameraConfig) -> Self {
        let (device_type, service_name) = match camera.device_type {
            DeviceType::AlwaysAvailable => (DeviceKind::AlwaysAvailable, None),
            DeviceType::StreamInterrupt { service_name } => {
                (DeviceKind::StreamInterrupt, Some(service_name))
            }
        };

        Self {
            name: camera.name,
            device_path: camera.device_path,
            device_type,
            width: camera.width,
            height: camera.height,
            pixel_format: camera.pixel_format,
            stereo: camera.stereo,
            service_name,
            roll_offset: camera.calibration.roll_offset,
            pitch_offset: camera.calibration.pitch_offset,
            yaw_offset: camera.calibration.yaw_offset,
        }
    }
}

/// Reject camera lists whose names collide
pub fn validate_camera_set(cameras: &[CameraConfig]) -> Result<(), CameraConfigError> {
    let mut seen = HashSet::with_capacity(cameras.len());
    for camera in cameras {
        if !seen.insert(camera.name.as_str()) {
            return Err(CameraConfigError::DuplicateName {
                name: camera.name.clone(),
            });
        }
    }
    Ok(())
}
