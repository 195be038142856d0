use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamsnapConfig {
    pub mqtt: MqttConfig,
    pub storage: StorageConfig,
    pub capture: CaptureConfig,
    pub services: ServiceConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MqttConfig {
    /// Broker host name or address
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Topic carrying roll/pitch/yaw JSON messages
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,

    /// Client identifier (defaults to camsnap_imu_<pid>)
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Pause before polling again after a connection error
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Directory receiving captured images
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,

    /// JSON file holding the ordered camera list
    #[serde(default = "default_camera_store")]
    pub camera_store: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Capture utility (v4l2-ctl compatible)
    #[serde(default = "default_capture_tool")]
    pub tool: String,

    #[serde(default = "default_capture_timeout_secs")]
    pub timeout_secs: u64,

    /// Smallest output file accepted as a real frame
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,

    /// Pause between cameras of a batch
    #[serde(default = "default_inter_camera_delay_ms")]
    pub inter_camera_delay_ms: u64,

    /// Run the busy probe right before each capture
    #[serde(default = "default_probe_before_capture")]
    pub probe_before_capture: bool,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Command prefix used for `<prefix> stop|restart <service>`
    #[serde(default = "default_service_command")]
    pub command: Vec<String>,

    #[serde(default = "default_service_timeout_secs")]
    pub timeout_secs: u64,

    /// Settle interval after stopping the service of a single camera
    #[serde(default = "default_single_settle_ms")]
    pub single_settle_ms: u64,

    /// Settle interval after stopping all services of a batch
    #[serde(default = "default_batch_settle_ms")]
    pub batch_settle_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelemetryConfig {
    /// Samples older than this are not embedded (unset accepts any age)
    #[serde(default)]
    pub max_age_secs: Option<u64>,

    /// Value written into the primary IFD Software field
    #[serde(default = "default_software_tag")]
    pub software_tag: String,
}

impl CamsnapConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("mqtt.host", default_mqtt_host())?
            .set_default("mqtt.port", default_mqtt_port())?
            .set_default("mqtt.topic", default_mqtt_topic())?
            .set_default("mqtt.keep_alive_secs", default_keep_alive_secs())?
            .set_default("mqtt.reconnect_delay_secs", default_reconnect_delay_secs())?
            .set_default("storage.snapshot_dir", default_snapshot_dir())?
            .set_default("storage.camera_store", default_camera_store())?
            .set_default("capture.tool", default_capture_tool())?
            .set_default("capture.timeout_secs", default_capture_timeout_secs())?
            .set_default("capture.min_file_size", default_min_file_size())?
            .set_default("capture.inter_camera_delay_ms", default_inter_camera_delay_ms())?
            .set_default("capture.probe_before_capture", default_probe_before_capture())?
            .set_default("capture.probe_timeout_secs", default_probe_timeout_secs())?
            .set_default("services.command", default_service_command())?
            .set_default("services.timeout_secs", default_service_timeout_secs())?
            .set_default("services.single_settle_ms", default_single_settle_ms())?
            .set_default("services.batch_settle_ms", default_batch_settle_ms())?
            .set_default("telemetry.software_tag", default_software_tag())?
            .add_source(File::with_name(&path_str).required(false))
            // CAMSNAP_CAPTURE__TIMEOUT_SECS=10 overrides capture.timeout_secs
            .add_source(
                Environment::with_prefix("CAMSNAP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: CamsnapConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.host.trim().is_empty() {
            return Err(ConfigError::Message("MQTT host must not be empty".to_string()));
        }

        if self.mqtt.port == 0 {
            return Err(ConfigError::Message(
                "MQTT port must be greater than 0".to_string(),
            ));
        }

        if self.mqtt.topic.trim().is_empty() {
            return Err(ConfigError::Message("MQTT topic must not be empty".to_string()));
        }

        if self.capture.tool.trim().is_empty() {
            return Err(ConfigError::Message(
                "Capture tool must not be empty".to_string(),
            ));
        }

        if self.capture.timeout_secs == 0 || self.capture.probe_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Capture and probe timeouts must be greater than 0".to_string(),
            ));
        }

        if self.capture.min_file_size == 0 {
            return Err(ConfigError::Message(
                "Minimum capture file size must be greater than 0".to_string(),
            ));
        }

        if self.services.command.is_empty() {
            return Err(ConfigError::Message(
                "Service control command must not be empty".to_string(),
            ));
        }

        if self.services.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Service timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn client_id(&self) -> String {
        self.mqtt
            .client_id
            .clone()
            .unwrap_or_else(|| format!("camsnap_imu_{}", std::process::id()))
    }
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn inter_camera_delay(&self) -> Duration {
        Duration::from_millis(self.inter_camera_delay_ms)
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn single_settle(&self) -> Duration {
        Duration::from_millis(self.single_settle_ms)
    }

    pub fn batch_settle(&self) -> Duration {
        Duration::from_millis(self.batch_settle_ms)
    }
}

impl TelemetryConfig {
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }
}

impl Default for CamsnapConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                host: default_mqtt_host(),
                port: default_mqtt_port(),
                topic: default_mqtt_topic(),
                client_id: None,
                keep_alive_secs: default_keep_alive_secs(),
                reconnect_delay_secs: default_reconnect_delay_secs(),
            },
            storage: StorageConfig {
                snapshot_dir: default_snapshot_dir(),
                camera_store: default_camera_store(),
            },
            capture: CaptureConfig {
                tool: default_capture_tool(),
                timeout_secs: default_capture_timeout_secs(),
                min_file_size: default_min_file_size(),
                inter_camera_delay_ms: default_inter_camera_delay_ms(),
                probe_before_capture: default_probe_before_capture(),
                probe_timeout_secs: default_probe_timeout_secs(),
            },
            services: ServiceConfig {
                command: default_service_command(),
                timeout_secs: default_service_timeout_secs(),
                single_settle_ms: default_single_settle_ms(),
                batch_settle_ms: default_batch_settle_ms(),
            },
            telemetry: TelemetryConfig {
                max_age_secs: None,
                software_tag: default_software_tag(),
            },
        }
    }
}

// Default value functions
fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_mqtt_topic() -> String {
    "status/".to_string()
}
fn default_keep_alive_secs() -> u64 {
    60
}
fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_snapshot_dir() -> String {
    "snapshots".to_string()
}
fn default_camera_store() -> String {
    "config.json".to_string()
}

fn default_capture_tool() -> String {
    "v4l2-ctl".to_string()
}
fn default_capture_timeout_secs() -> u64 {
    30
}
fn default_min_file_size() -> u64 {
    1000
}
fn default_inter_camera_delay_ms() -> u64 {
    50
}
fn default_probe_before_capture() -> bool {
    true
}
fn default_probe_timeout_secs() -> u64 {
    3
}

fn default_service_command() -> Vec<String> {
    vec!["sudo".to_string(), "systemctl".to_string()]
}
fn default_service_timeout_secs() -> u64 {
    15
}
fn default_single_settle_ms() -> u64 {
    1000
}
fn default_batch_settle_ms() -> u64 {
    2000
}

fn default_software_tag() -> String {
    "camsnap".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CamsnapConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.capture.min_file_size, 1000);
        assert_eq!(config.services.single_settle(), Duration::from_secs(1));
        assert_eq!(config.services.batch_settle(), Duration::from_secs(2));
        assert_eq!(config.telemetry.max_age(), None);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CamsnapConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.mqtt.topic, "status/");
        assert_eq!(config.capture.tool, "v4l2-ctl");
        assert_eq!(config.services.command, vec!["sudo", "systemctl"]);
    }

    #[test]
    fn test_load_from_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camsnap.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[capture]\ntimeout_secs = 10\n\n[telemetry]\nmax_age_secs = 5\n\n[services]\ncommand = [\"systemctl\"]"
        )
        .unwrap();

        let config = CamsnapConfig::load_from_file(&path).unwrap();

        assert_eq!(config.capture.timeout(), Duration::from_secs(10));
        assert_eq!(config.capture.min_file_size, 1000);
        assert_eq!(config.telemetry.max_age(), Some(Duration::from_secs(5)));
        assert_eq!(config.services.command, vec!["systemctl"]);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CamsnapConfig::default();

        config.capture.min_file_size = 0;
        assert!(config.validate().is_err());

        config.capture.min_file_size = 1000;
        config.services.command.clear();
        assert!(config.validate().is_err());

        config.services.command = vec!["systemctl".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_id_default_uses_pid() {
        let config = CamsnapConfig::default();
        assert_eq!(
            config.client_id(),
            format!("camsnap_imu_{}", std::process::id())
        );
    }
}
