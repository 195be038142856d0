use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamsnapError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Camera configuration error: {0}")]
    Camera(#[from] CameraConfigError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rejections raised before any device interaction
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraConfigError {
    #[error("Camera field '{field}' is required")]
    MissingField { field: &'static str },

    #[error("Camera with name '{name}' already exists")]
    DuplicateName { name: String },

    #[error("Service name is required for stream_interrupt camera '{name}'")]
    MissingServiceName { name: String },

    #[error("Camera '{name}' is always_available but names service '{service_name}'")]
    UnexpectedServiceName { name: String, service_name: String },

    #[error("Camera '{name}' has invalid resolution {width}x{height}")]
    InvalidResolution { name: String, width: u32, height: u32 },

    #[error("Camera '{name}' not found")]
    NotFound { name: String },
}

/// Failures of the image metadata container codec
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExifError {
    #[error("Not a JPEG file (missing SOI marker)")]
    NotJpeg,

    #[error("Truncated {context} at offset {offset}")]
    Truncated { context: &'static str, offset: usize },

    #[error("Invalid marker 0x{marker:02X} at offset {offset}")]
    InvalidMarker { marker: u8, offset: usize },

    #[error("Invalid TIFF header")]
    InvalidTiffHeader,

    #[error("EXIF payload of {size} bytes exceeds the APP1 segment limit")]
    SegmentTooLarge { size: usize },

    #[error("Unsupported user comment encoding")]
    UnknownCommentEncoding,

    #[error("User comment is not valid text: {details}")]
    CommentDecode { details: String },
}

/// Failures of the embed-then-verify operation
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("File not found for metadata embedding: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to serialize metadata record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Metadata container error: {0}")]
    Container(#[from] ExifError),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("User comment not found in {} after write", path.display())]
    VerificationMissing { path: PathBuf },

    #[error("User comment mismatch: expected '{expected}', retrieved '{retrieved}'")]
    VerificationMismatch { expected: String, retrieved: String },

    #[error("User comment could not be decoded: {details}")]
    Decode { details: String },
}

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to decode telemetry payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Telemetry payload is not a JSON object")]
    NotAnObject,
}

pub type Result<T> = std::result::Result<T, CamsnapError>;
