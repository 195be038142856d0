use super::*;
use crate::error::{CameraConfigError, CamsnapError};
use tempfile::TempDir;

fn create_test_record(name: &str) -> CameraRecord {
    CameraRecord {
        name: name.to_string(),
        device_path: "/dev/video0".to_string(),
        device_type: DeviceKind::AlwaysAvailable,
        width: 1920,
        height: 1080,
        pixel_format: "mjpg".to_string(),
        stereo: false,
        service_name: None,
        roll_offset: 0.0,
        pitch_offset: 0.0,
        yaw_offset: 0.0,
    }
}

fn create_test_camera(name: &str, stereo: bool) -> CameraConfig {
    let mut record = create_test_record(name);
    record.stereo = stereo;
    CameraConfig::try_from(record).unwrap()
}

#[test]
fn test_record_conversion_normalizes_fields() {
    let mut record = create_test_record(" cam1 ");
    record.roll_offset = 0.5;

    let camera = CameraConfig::try_from(record).unwrap();

    assert_eq!(camera.name, "cam1");
    assert_eq!(camera.pixel_format, "MJPG");
    assert_eq!(camera.device_type, DeviceType::AlwaysAvailable);
    assert_eq!(camera.calibration.roll_offset, 0.5);
    assert!(!camera.requires_interrupt());
}

#[test]
fn test_stream_interrupt_requires_service_name() {
    let mut record = create_test_record("front");
    record.device_type = DeviceKind::StreamInterrupt;
    record.service_name = Some("  ".to_string());

    assert_eq!(
        CameraConfig::try_from(record.clone()),
        Err(CameraConfigError::MissingServiceName {
            name: "front".to_string()
        })
    );

    record.service_name = Some("mediamtx".to_string());
    let camera = CameraConfig::try_from(record).unwrap();
    assert_eq!(camera.service_name(), Some("mediamtx"));
}

#[test]
fn test_always_available_rejects_service_name() {
    let mut record = create_test_record("rear");
    record.service_name = Some("mediamtx".to_string());

    assert!(matches!(
        CameraConfig::try_from(record),
        Err(CameraConfigError::UnexpectedServiceName { .. })
    ));
}

#[test]
fn test_missing_required_fields_rejected() {
    let mut record = create_test_record("");
    assert_eq!(
        CameraConfig::try_from(record.clone()),
        Err(CameraConfigError::MissingField { field: "name" })
    );

    record.name = "cam".to_string();
    record.device_path = String::new();
    assert_eq!(
        CameraConfig::try_from(record.clone()),
        Err(CameraConfigError::MissingField {
            field: "device_path"
        })
    );

    record.device_path = "/dev/video2".to_string();
    record.width = 0;
    assert!(matches!(
        CameraConfig::try_from(record),
        Err(CameraConfigError::InvalidResolution { .. })
    ));
}

#[test]
fn test_deserialize_persisted_shape() {
    let json = r#"[
        {"name": "left", "device_path": "/dev/video0", "type": "stream_interrupt",
         "width": 1280, "height": 720, "pixel_format": "MJPG", "stereo": true,
         "service_name": "camera-stream", "roll_offset": 0.5, "pitch_offset": 0.0, "yaw_offset": -1.0},
        {"name": "right", "device_path": "/dev/video2", "type": "always_available",
         "width": 1280, "height": 720, "pixel_format": "MJPG", "stereo": true, "service_name": ""}
    ]"#;

    let cameras: Vec<CameraConfig> = serde_json::from_str(json).unwrap();

    assert_eq!(cameras.len(), 2);
    assert_eq!(cameras[0].service_name(), Some("camera-stream"));
    assert_eq!(cameras[0].calibration.yaw_offset, -1.0);
    assert_eq!(cameras[1].device_type, DeviceType::AlwaysAvailable);
    assert_eq!(cameras[1].calibration, Calibration::default());
}

#[test]
fn test_validate_camera_set_rejects_duplicates() {
    let cameras = vec![
        create_test_camera("cam1", false),
        create_test_camera("cam2", false),
        create_test_camera("cam1", true),
    ];

    assert_eq!(
        validate_camera_set(&cameras),
        Err(CameraConfigError::DuplicateName {
            name: "cam1".to_string()
        })
    );
    assert!(validate_camera_set(&cameras[..2]).is_ok());
}

#[tokio::test]
async fn test_store_missing_file_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonCameraStore::new(temp_dir.path().join("config.json"));

    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_add_find_remove() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonCameraStore::new(temp_dir.path().join("config.json"));

    store.add(create_test_camera("left", true)).await.unwrap();
    store.add(create_test_camera("right", true)).await.unwrap();
    store.add(create_test_camera("top", false)).await.unwrap();

    let names: Vec<String> = store
        .load()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["left", "right", "top"]);

    let stereo = store.stereo().await.unwrap();
    assert_eq!(stereo.len(), 2);
    assert_eq!(stereo[0].name, "left");

    assert_eq!(store.find("top").await.unwrap().name, "top");
    assert!(matches!(
        store.find("missing").await,
        Err(CamsnapError::Camera(CameraConfigError::NotFound { .. }))
    ));

    assert!(store.remove("right").await.unwrap());
    assert!(!store.remove("right").await.unwrap());
    assert_eq!(store.load().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_store_rejects_duplicate_add() {
    let temp_dir = TempDir::new().unwrap();
    let store = JsonCameraStore::new(temp_dir.path().join("config.json"));

    store.add(create_test_camera("cam1", false)).await.unwrap();
    let result = store.add(create_test_camera("cam1", true)).await;

    assert!(matches!(
        result,
        Err(CamsnapError::Camera(CameraConfigError::DuplicateName { .. }))
    ));
    assert_eq!(store.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_rejects_invalid_file_at_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    tokio::fs::write(
        &path,
        r#"[{"name": "cam", "device_path": "/dev/video0", "type": "stream_interrupt",
             "width": 640, "height": 480, "pixel_format": "MJPG"}]"#,
    )
    .await
    .unwrap();

    let store = JsonCameraStore::new(&path);
    assert!(store.load().await.is_err());
}
