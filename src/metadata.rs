use crate::camera::Calibration;
use crate::error::MetadataError;
use crate::exif;
use crate::telemetry::TelemetrySample;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

/// Orientation record stored in an image's UserComment.
///
/// Absent fields are omitted from the JSON entirely rather than written as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedMetadataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roll: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl EmbeddedMetadataRecord {
    /// Calibration-adjusted record for `sample`
    pub fn from_sample(sample: &TelemetrySample, calibration: &Calibration) -> Self {
        Self {
            roll: sample
                .roll
                .clone()
                .map(|v| apply_offset("roll", v, calibration.roll_offset)),
            pitch: sample
                .pitch
                .clone()
                .map(|v| apply_offset("pitch", v, calibration.pitch_offset)),
            yaw: sample
                .yaw
                .clone()
                .map(|v| apply_offset("yaw", v, calibration.yaw_offset)),
            timestamp: sample.timestamp,
        }
    }

    pub fn has_orientation(&self) -> bool {
        self.roll.is_some() || self.pitch.is_some() || self.yaw.is_some()
    }

    /// Compact JSON text as stored in the comment field
    pub fn to_comment(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Add `offset` to a reported value; values that are not numbers stay as they are
fn apply_offset(field: &str, value: Value, offset: f64) -> Value {
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match number.and_then(|n| Number::from_f64(n + offset)) {
        Some(adjusted) => Value::Number(adjusted),
        None => {
            warn!(
                "Could not apply {} offset, invalid {} data: {}",
                field, field, value
            );
            value
        }
    }
}

/// What an embedding call did to the file
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    /// The comment was written and read back identically
    Embedded { comment: String },
    /// No orientation data was available; the file was left untouched
    NothingToEmbed,
}

/// Writes calibrated telemetry into captured images and verifies the write
#[derive(Debug, Clone)]
pub struct MetadataEmbedder {
    software_tag: Option<String>,
    max_age: Option<Duration>,
}

impl MetadataEmbedder {
    pub fn new(software_tag: Option<String>, max_age: Option<Duration>) -> Self {
        Self {
            software_tag: software_tag.filter(|tag| !tag.is_empty()),
            max_age,
        }
    }

    pub async fn embed(
        &self,
        path: &Path,
        sample: &TelemetrySample,
        calibration: &Calibration,
    ) -> Result<EmbedOutcome, MetadataError> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            warn!("File not found for metadata embedding: {}", path.display());
            return Err(MetadataError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        if let (Some(max_age), Some(age)) = (self.max_age, sample.age()) {
            if age > max_age {
                warn!(
                    "IMU sample is {:.1}s old (limit {}s), not embedding it into {}",
                    age.as_secs_f64(),
                    max_age.as_secs(),
                    path.display()
                );
                return Ok(EmbedOutcome::NothingToEmbed);
            }
        }

        let record = EmbeddedMetadataRecord::from_sample(sample, calibration);
        if !record.has_orientation() {
            info!(
                "No relevant IMU data (roll, pitch, yaw) to embed for {}",
                path.display()
            );
            return Ok(EmbedOutcome::NothingToEmbed);
        }

        let comment = record.to_comment()?;
        let image = read(path).await?;
        let tagged = exif::write_user_comment(&image, &comment, self.software_tag.as_deref())?;
        fs::write(path, &tagged)
            .await
            .map_err(|source| MetadataError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            "Embedded IMU data into {}. UserComment: {}",
            path.display(),
            comment
        );

        self.verify(path, &comment).await?;
        Ok(EmbedOutcome::Embedded { comment })
    }

    /// Re-read the file and require the exact comment text back
    async fn verify(&self, path: &Path, expected: &str) -> Result<(), MetadataError> {
        let image = read(path).await?;
        verify_comment(path, &image, expected)?;
        info!(
            "Verification success: UserComment read back from {}",
            path.display()
        );
        Ok(())
    }
}

/// Check that `image` carries exactly `expected` as its UserComment
fn verify_comment(path: &Path, image: &[u8], expected: &str) -> Result<(), MetadataError> {
    match exif::read_user_comment(image) {
        Ok(Some(retrieved)) if retrieved == expected => Ok(()),
        Ok(Some(retrieved)) => {
            warn!("Verification mismatch: UserComment differs in {}", path.display());
            warn!("  Expected: '{}'", expected);
            warn!("  Retrieved: '{}'", retrieved);
            Err(MetadataError::VerificationMismatch {
                expected: expected.to_string(),
                retrieved,
            })
        }
        Ok(None) => {
            warn!(
                "Verification failed: UserComment not found in {} after write",
                path.display()
            );
            Err(MetadataError::VerificationMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => {
            warn!("Verification exception for {}: {}", path.display(), e);
            Err(MetadataError::Decode {
                details: e.to_string(),
            })
        }
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, MetadataError> {
    fs::read(path).await.map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode the orientation record embedded in an image.
///
/// `Ok(None)` means the image carries no comment field at all.
pub async fn read_embedded_record(
    path: &Path,
) -> Result<Option<EmbeddedMetadataRecord>, MetadataError> {
    let image = read(path).await?;

    let Some(comment) = exif::read_user_comment(&image)? else {
        debug!("No UserComment in {}", path.display());
        return Ok(None);
    };

    serde_json::from_str(&comment)
        .map(Some)
        .map_err(|e| MetadataError::Decode {
            details: format!("{} (content: {})", e, comment),
        })
}
