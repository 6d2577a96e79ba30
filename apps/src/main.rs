use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use ledmatrix::prelude::*;

mod builtin;

/// Runs the LED matrix engine against the simulated panel and reads control
/// commands from stdin, one per line.
#[derive(Parser, Debug)]
#[command(name = "ledmatrix", version, about)]
struct Args {
    /// Config file; defaults to <config dir>/LedMatrix/config.json
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<usize>,

    #[arg(long)]
    height: Option<usize>,

    /// App to activate on startup
    #[arg(long)]
    app: Option<String>,

    /// Saved app settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the last frame as a PNG on exit
    #[arg(long)]
    preview: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_logger();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> MatrixResult<MatrixConfig> {
    let path = args.config.clone().or_else(MatrixConfig::default_path);
    let mut config = match path {
        Some(path) => {
            info!("loading config from {}", path.display());
            MatrixConfig::load(path)?
        }
        None => MatrixConfig::default(),
    };

    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(app) = &args.app {
        config.initial_app = app.clone();
    }
    if let Some(settings) = &args.settings {
        config.settings_path = Some(settings.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> MatrixResult<()> {
    let config = load_config(&args)?;

    let device = Arc::new(
        SimulatedDevice::new(config.width, config.height)
            .with_brightness(config.brightness),
    );

    let dimensions = Dimensions::new(config.width, config.height);
    let mut registry = AppRegistry::new(dimensions)
        .with_config(config.apps.clone())
        .with_deactivate_timeout(config.deactivate_timeout());
    if let Some(path) = config.settings_path() {
        let storage = AppSettingsStorage::open(path);
        registry = registry.with_storage(Arc::new(storage));
    }
    let registry = Arc::new(registry);
    builtin::register_all(&registry);

    let scheduler = Arc::new(FrameScheduler::new(
        device.clone(),
        registry.clone(),
        SchedulerOptions::from(&config),
    ));
    let controller =
        Controller::new(registry.clone(), scheduler.clone(), device.clone())
            .with_preview(device.clone());

    scheduler.start();
    if let Err(err) = registry.activate(&config.initial_app).await {
        warn!("initial app '{}' not started: {}", config.initial_app, err);
    }

    info!(
        "{}x{} panel ready; commands: list, activate <id>, settings <id>, \
         set <id> <key> <json>, status, brightness <0-255>, power on|off, \
         preview <path>, quit",
        config.width, config.height
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = &mut interrupt => {
                info!("interrupted");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!("stdin closed: {}", err);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match ControlCommand::parse(&line) {
            Ok(ControlCommand::Quit) => break,
            Ok(command) => println!("{}", controller.execute(command).await),
            Err(err) => {
                println!("{}", serde_json::json!({ "error": err.to_string() }))
            }
        }
    }

    controller.shutdown().await;

    if let Some(path) = args.preview {
        device.save_png(&path).map_err(|err| {
            MatrixError::Control(format!("preview {}: {}", path.display(), err))
        })?;
        info!("wrote preview to {}", path.display());
    }

    Ok(())
}
