use clap::Parser;
use rgbw_light_controller::domain::settings::SettingsService;
use rgbw_light_controller::infrastructure::bluetooth::{BtleplugPlatform, LightController};
use rgbw_light_controller::infrastructure::logging;
use rgbw_light_controller::presentation::console;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rgbw-light")]
#[command(about = "Control an RGBW Bluetooth LE light")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(short, long)]
    settings: Option<PathBuf>,
    /// Advertised name of the light to connect to
    #[arg(short, long)]
    device_name: Option<String>,
    /// Log filter, e.g. "debug" or "rgbw_light_controller=trace"
    #[arg(short, long)]
    log_level: Option<String>,
    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_settings: bool,
    /// Start connecting immediately
    #[arg(short, long)]
    connect: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings_service = match cli.settings {
        Some(path) => SettingsService::from_path(path),
        None => SettingsService::new()?,
    };
    if let Some(name) = cli.device_name {
        settings_service.get_mut().device_name = name;
    }
    if let Some(level) = cli.log_level {
        settings_service.get_mut().log_settings.level = level;
    }

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)?;
    info!("Starting RGBW light controller");

    let config = settings_service.get().controller_config()?;
    if cli.save_settings {
        settings_service.save()?;
        info!("Settings saved to {}", settings_service.path().display());
    }

    let (ble_tx, ble_rx) = mpsc::unbounded_channel();
    let platform = Arc::new(BtleplugPlatform::new(ble_tx).await?);

    let (app_tx, app_rx) = mpsc::unbounded_channel();
    let (controller, handle) = LightController::new(platform.clone(), ble_rx, config);
    let controller = tokio::spawn(controller.with_event_sender(app_tx).run());

    if cli.connect {
        handle.request_connect();
    }

    console::run(handle.clone(), app_rx).await?;

    handle.shutdown();
    controller.await?;
    if let Err(e) = platform.shutdown().await {
        warn!("Failed to stop scan: {}", e);
    }

    Ok(())
}
