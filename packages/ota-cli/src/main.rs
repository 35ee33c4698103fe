mod logging;

use clap::{Parser, Subcommand};
use ota_config::{get_data_path, FileStateStore, UpdaterConfig};
use ota_core::{
    notifier_for, CheckFinished, Connectivity, HttpUpdateSource, StaticConnectivity,
    SystemConnectivity, UpdateCheckService,
};
use ota_update::BuildDate;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "ota-updater")]
#[command(about = "Check the OTA server for newer builds of this device")]
struct Cli {
    /// Directory holding config.json and state.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Update server base url
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Device code name, read from ro.product.device when omitted
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single update check
    Check,
    /// Check periodically until interrupted
    Watch {
        /// Seconds between two checks
        #[arg(long, default_value_t = 21600)]
        interval: u64,
    },
    /// Show the outcome of the last check
    Status,
    /// List the last known updates
    List,
}

enum Outcome {
    Finished(CheckFinished),
    Skipped,
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_data_path()?,
    };
    let mut config = UpdaterConfig::load(&data_dir)?;
    if let Some(base_url) = cli.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(device) = cli.device {
        config = config.with_device(device);
    }
    let service = build_service(&config, &data_dir)?;

    match cli.command {
        Commands::Check => {
            if let Outcome::Finished(event) = run_once(&service).await {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
        }
        Commands::Watch { interval } => {
            watch(&service, Duration::from_secs(interval.max(1))).await?;
        }
        Commands::Status => {
            let state = service.load_state().await?;
            let status = json!({
                "device": service.device(),
                "installed_build_date": service.installed_build_date().as_str(),
                "last_update_check": state.last_update_check,
                "boot_check_completed": state.boot_check_completed,
                "update_count": state.updates.len(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::List => {
            let updates = service.available_updates().await?;
            if updates.is_empty() {
                println!("No updates known, run a check first");
            }
            for update in updates {
                let mut value = serde_json::to_value(&update)?;
                if let Some(fields) = value.as_object_mut() {
                    fields.insert(
                        "newer_than_installed".to_string(),
                        update.is_newer_than_installed().into(),
                    );
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
    }

    Ok(())
}

fn build_service(
    config: &UpdaterConfig,
    data_dir: &Path,
) -> Result<UpdateCheckService, Box<dyn std::error::Error>> {
    let device = config
        .resolve_device()
        .ok_or("device name unknown, pass --device or set OTA_DEVICE")?;
    let build_date = config.resolve_installed_build_date().unwrap_or_else(|| {
        warn!("installed build date unknown, no update will be considered newer");
        String::new()
    });
    debug!(%device, %build_date, data_dir = %data_dir.display(), "resolved device");

    let source = HttpUpdateSource::from_config(config, &device, &build_date);
    let connectivity: Arc<dyn Connectivity> = if config.assume_online {
        Arc::new(StaticConnectivity(true))
    } else {
        Arc::new(SystemConnectivity::new())
    };

    Ok(UpdateCheckService::builder(
        device,
        BuildDate::parse(&build_date),
        Arc::new(source),
        Arc::new(FileStateStore::in_dir(data_dir)),
    )
    .notifier(notifier_for(config.notifier, config.notification_uid))
    .connectivity(connectivity)
    .strings(config.strings.clone())
    .build())
}

/// Run one check, cancelling it on Ctrl-C.
async fn run_once(service: &UpdateCheckService) -> Outcome {
    let handle = match service.check() {
        Ok(handle) => handle,
        Err(e) => {
            println!("{}", e);
            return Outcome::Skipped;
        }
    };
    tokio::select! {
        event = handle.wait() => match event {
            Some(event) => Outcome::Finished(event),
            None => Outcome::Skipped,
        },
        _ = tokio::signal::ctrl_c() => {
            service.cancel_check();
            info!("update check cancelled");
            Outcome::Interrupted
        }
    }
}

async fn watch(
    service: &UpdateCheckService,
    interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(interval_secs = interval.as_secs(), "watching for updates");
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        match run_once(service).await {
            Outcome::Finished(event) => println!("{}", serde_json::to_string(&event)?),
            Outcome::Skipped => {}
            Outcome::Interrupted => break,
        }
    }
    Ok(())
}
