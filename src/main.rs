use anyhow::{anyhow, bail, Context, Result};
use camsnap::camera::{CameraRecord, DeviceKind};
use camsnap::error::CameraConfigError;
use camsnap::{
    CameraConfig, CameraStore, CamsnapConfig, CaptureOrchestrator, CaptureOutcome,
    JsonCameraStore, SystemProcessRunner, TelemetryCache, TelemetrySubscriber,
};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "camsnap")]
#[command(about = "Multi-camera still capture with IMU orientation embedded in EXIF metadata")]
#[command(version)]
#[command(long_about = "Captures still images from V4L2 cameras, stopping and restarting the \
streaming services that hold them open, and writes the latest roll/pitch/yaw reported over \
MQTT into each image's EXIF UserComment.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camsnap.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture one camera by name
    Snapshot {
        name: String,
        #[command(flatten)]
        telemetry: TelemetryArgs,
    },
    /// Capture every configured camera in order
    All {
        #[command(flatten)]
        telemetry: TelemetryArgs,
    },
    /// Capture the stereo cameras with a single service interruption
    Stereo {
        #[command(flatten)]
        telemetry: TelemetryArgs,
    },
    /// Manage the camera list
    Cameras {
        #[command(subcommand)]
        action: CameraAction,
    },
    /// Print the effective configuration in TOML format
    Config,
}

#[derive(ClapArgs, Debug)]
struct TelemetryArgs {
    /// Capture without connecting to the IMU feed
    #[arg(long)]
    no_telemetry: bool,

    /// Seconds to wait for a first IMU sample before capturing
    #[arg(long, value_name = "SECS", default_value_t = 2.0)]
    telemetry_wait: f64,
}

#[derive(Subcommand, Debug)]
enum CameraAction {
    /// List configured cameras as JSON
    List,
    /// Add a camera
    Add(AddCamera),
    /// Remove a camera by name
    Remove { name: String },
}

#[derive(ClapArgs, Debug)]
struct AddCamera {
    #[arg(long)]
    name: String,

    /// Device node, e.g. /dev/video0
    #[arg(long)]
    device: String,

    #[arg(long = "type", value_enum, default_value_t = CameraKind::AlwaysAvailable)]
    kind: CameraKind,

    /// Service holding the device open (stream_interrupt cameras only)
    #[arg(long)]
    service: Option<String>,

    #[arg(long, default_value_t = 1920)]
    width: u32,

    #[arg(long, default_value_t = 1080)]
    height: u32,

    #[arg(long, default_value = "MJPG")]
    pixel_format: String,

    /// Member of the stereo set
    #[arg(long)]
    stereo: bool,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    roll_offset: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pitch_offset: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    yaw_offset: f64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
enum CameraKind {
    AlwaysAvailable,
    StreamInterrupt,
}

impl From<CameraKind> for DeviceKind {
    fn from(kind: CameraKind) -> Self {
        match kind {
            CameraKind::AlwaysAvailable => DeviceKind::AlwaysAvailable,
            CameraKind::StreamInterrupt => DeviceKind::StreamInterrupt,
        }
    }
}

impl AddCamera {
    fn into_camera(self) -> Result<CameraConfig, CameraConfigError> {
        CameraConfig::try_from(CameraRecord {
            name: self.name,
            device_path: self.device,
            device_type: self.kind.into(),
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format,
            stereo: self.stereo,
            service_name: self.service,
            roll_offset: self.roll_offset,
            pitch_offset: self.pitch_offset,
            yaw_offset: self.yaw_offset,
        })
    }
}

/// Which cameras a capture command targets
enum Target {
    Single(String),
    All,
    Stereo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let config = CamsnapConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;
    config.validate().context("Invalid configuration")?;
    info!("Configuration loaded from: {}", args.config);

    let store = JsonCameraStore::new(&config.storage.camera_store);

    match args.command {
        Command::Snapshot { name, telemetry } => {
            run_capture(&config, &store, Target::Single(name), &telemetry).await
        }
        Command::All { telemetry } => run_capture(&config, &store, Target::All, &telemetry).await,
        Command::Stereo { telemetry } => {
            run_capture(&config, &store, Target::Stereo, &telemetry).await
        }
        Command::Cameras { action } => manage_cameras(&store, action).await,
        Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run_capture(
    config: &CamsnapConfig,
    store: &JsonCameraStore,
    target: Target,
    telemetry: &TelemetryArgs,
) -> Result<()> {
    // Resolve cameras first so configuration problems never touch a device
    let cameras = match &target {
        Target::Single(name) => vec![store.find(name).await?],
        Target::All => store.load().await?,
        Target::Stereo => store.stereo().await?,
    };
    if cameras.is_empty() {
        bail!(match target {
            Target::Stereo => "No stereo cameras configured",
            _ => "No cameras configured",
        });
    }

    let cache = TelemetryCache::new();
    let subscriber = if telemetry.no_telemetry {
        info!("Telemetry disabled, images will carry no orientation");
        None
    } else {
        let subscriber = TelemetrySubscriber::new(config.mqtt.clone(), config.client_id(), cache.clone());
        let token = subscriber.cancellation_token();
        let handle = subscriber.start();

        let wait = Duration::try_from_secs_f64(telemetry.telemetry_wait.max(0.0))
            .map_err(|e| anyhow!("Invalid telemetry wait: {}", e))?;
        if !cache.wait_for_sample(wait).await {
            warn!(
                "No IMU sample received within {:.1}s, capturing without orientation",
                wait.as_secs_f64()
            );
        }
        Some((token, handle))
    };

    let orchestrator = CaptureOrchestrator::new(config, Arc::new(SystemProcessRunner), cache);
    let results: Vec<CaptureOutcome> = match target {
        Target::Single(_) => vec![orchestrator.capture_single(&cameras[0]).await],
        Target::All => orchestrator.capture_all(&cameras).await?,
        Target::Stereo => orchestrator.capture_stereo(&cameras).await?,
    };

    if let Some((token, handle)) = subscriber {
        token.cancel();
        if tokio::time::timeout(Duration::from_secs(2), handle).await.is_err() {
            warn!("Telemetry subscriber did not stop in time");
        }
    }

    println!("{}", serde_json::to_string_pretty(&results)?);

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        error!("{} of {} captures failed", failed, results.len());
        std::process::exit(1);
    }
    Ok(())
}

async fn manage_cameras(store: &JsonCameraStore, action: CameraAction) -> Result<()> {
    match action {
        CameraAction::List => {
            let cameras = store.load().await?;
            println!("{}", serde_json::to_string_pretty(&cameras)?);
        }
        CameraAction::Add(args) => {
            let camera = args.into_camera()?;
            let name = camera.name.clone();
            store.add(camera).await?;
            println!("Added camera '{}'", name);
        }
        CameraAction::Remove { name } => {
            if !store.remove(&name).await? {
                bail!("Camera '{}' not found", name);
            }
            println!("Removed camera '{}'", name);
        }
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camsnap={}", log_level)));

    // Results go to stdout, so logs stay on stderr
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_writer(std::io::stderr).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))?;

    Ok(())
}
