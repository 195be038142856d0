use super::types::{validate_camera_set, CameraConfig, DeviceType};
use crate::error::{CameraConfigError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// Ordered, externally persisted camera list.
///
/// The list is read in full before every operation that needs it and
/// rewritten in full on every mutation; nothing is cached across calls.
#[async_trait]
pub trait CameraStore: Send + Sync {
    /// Load and validate the full camera list
    async fn load(&self) -> Result<Vec<CameraConfig>>;

    /// Replace the full camera list
    async fn save(&self, cameras: &[CameraConfig]) -> Result<()>;

    async fn find(&self, name: &str) -> Result<CameraConfig> {
        self.load()
            .await?
            .into_iter()
            .find(|camera| camera.name == name)
            .ok_or_else(|| {
                CameraConfigError::NotFound {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Stereo members in configuration order
    async fn stereo(&self) -> Result<Vec<CameraConfig>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .filter(|camera| camera.stereo)
            .collect())
    }

    async fn add(&self, camera: CameraConfig) -> Result<()> {
        let mut cameras = self.load().await?;
        if cameras.iter().any(|existing| existing.name == camera.name) {
            return Err(CameraConfigError::DuplicateName { name: camera.name }.into());
        }
        if let DeviceType::StreamInterrupt { service_name } = &camera.device_type {
            if service_name.trim().is_empty() {
                return Err(CameraConfigError::MissingServiceName { name: camera.name }.into());
            }
        }

        info!("Adding camera '{}' ({})", camera.name, camera.device_path);
        cameras.push(camera);
        self.save(&cameras).await
    }

    /// Remove a camera by name, returning whether anything was removed
    async fn remove(&self, name: &str) -> Result<bool> {
        let mut cameras = self.load().await?;
        let before = cameras.len();
        cameras.retain(|camera| camera.name != name);
        let removed = cameras.len() != before;

        self.save(&cameras).await?;
        if removed {
            info!("Removed camera '{}'", name);
        }
        Ok(removed)
    }
}

/// Camera list persisted as a pretty-printed JSON array
pub struct JsonCameraStore {
    path: PathBuf,
}

impl JsonCameraStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CameraStore for JsonCameraStore {
    async fn load(&self) -> Result<Vec<CameraConfig>> {
        if !fs::try_exists(&self.path).await? {
            debug!("Camera store {} does not exist yet", self.path.display());
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).await?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let cameras: Vec<CameraConfig> = serde_json::from_str(&contents)?;
        validate_camera_set(&cameras)?;

        debug!(
            "Loaded {} camera(s) from {}",
            cameras.len(),
            self.path.display()
        );
        Ok(cameras)
    }

    async fn save(&self, cameras: &[CameraConfig]) -> Result<()> {
        validate_camera_set(cameras)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(cameras)?;
        fs::write(&self.path, json).await?;

        debug!("Saved {} camera(s) to {}", cameras.len(), self.path.display());
        Ok(())
    }
}
