use accident_alert::config::MonitorConfig;
use accident_alert::controller::{ControlCommand, MonitoringController};
use accident_alert::location::{FixedLocation, GeoPosition, LocationProvider};
use accident_alert::alert::{LogMessenger, Messenger};
use accident_alert::notify::ChannelNotifier;
use accident_alert::permissions::Permissions;
use accident_alert::contacts::ContactStore;
use accident_alert::platform::{TermuxAccelerometer, TermuxLocation, TermuxSms, WebhookMessenger};
use accident_alert::replay::ReplayFeed;
use accident_alert::sensors::SensorFeed;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    Termux,
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Location {
    Termux,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Termux,
    Webhook,
    Log,
}

#[derive(Parser, Debug)]
#[command(name = "accident_monitor")]
#[command(about = "Accident detection with SMS alerts to emergency contacts", long_about = None)]
struct Args {
    /// Duration in seconds (0 = continuous)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// JSON config file (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emergency contact phone number (up to two)
    #[arg(long = "contact", value_name = "PHONE")]
    contacts: Vec<String>,

    /// Crash threshold in m/s² (overrides config)
    #[arg(long)]
    threshold: Option<f64>,

    /// Accelerometer source
    #[arg(long, value_enum, default_value = "termux")]
    source: Source,

    /// Session log for --source replay (comparison_*.json[.gz])
    #[arg(long, required_if_eq("source", "replay"))]
    replay: Option<PathBuf>,

    /// Pace replay by recorded timestamps instead of as fast as possible
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Position source
    #[arg(long, value_enum, default_value = "termux")]
    location: Location,

    /// Latitude for --location fixed
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude for --location fixed
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// How alerts are sent
    #[arg(long, value_enum, default_value = "termux")]
    messenger: Backend,

    /// SMS gateway URL for --messenger webhook
    #[arg(long, required_if_eq("messenger", "webhook"))]
    webhook_url: Option<String>,

    /// Bearer token for the SMS gateway
    #[arg(long)]
    webhook_token: Option<String>,

    /// Write a JSON status snapshot here after each alert cycle and on exit
    #[arg(long)]
    status_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.contacts.len() > 2 {
        bail!("at most two emergency contacts are supported");
    }

    let mut config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    config.validate()?;

    println!("[{}] Accident Monitor Starting", ts_now());
    println!("  Duration: {} seconds (0=continuous)", args.duration);
    println!("  Threshold: {:.1} m/s²", config.threshold);
    println!("  Source: {:?}  Location: {:?}  Messenger: {:?}", args.source, args.location, args.messenger);
    println!("  Contacts: {}", args.contacts.len());

    let feed: Box<dyn SensorFeed> = match args.source {
        Source::Termux => Box::new(TermuxAccelerometer::new(
            config.sample_interval(),
            config.sample_buffer,
        )),
        Source::Replay => {
            let path = args.replay.as_ref().context("--replay is required")?;
            Box::new(ReplayFeed::open(path, args.realtime)?)
        }
    };

    let location: Arc<dyn LocationProvider> = match args.location {
        Location::Termux => Arc::new(TermuxLocation::new()),
        Location::Fixed => match (args.lat, args.lon) {
            (Some(lat), Some(lon)) => Arc::new(FixedLocation::new(Some(GeoPosition::new(lat, lon)))),
            _ => bail!("--location fixed needs --lat and --lon"),
        },
    };

    let messenger: Arc<dyn Messenger> = match args.messenger {
        Backend::Termux => Arc::new(TermuxSms::new()),
        Backend::Webhook => {
            let url = args.webhook_url.as_deref().context("--webhook-url is required")?;
            Arc::new(WebhookMessenger::new(url, args.webhook_token.clone())?)
        }
        Backend::Log => Arc::new(LogMessenger),
    };

    // Host-facing notices
    let (notifier, mut notices) = ChannelNotifier::new();
    let notice_handle = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            println!("[{}] [notice] {}", ts_now(), notice);
        }
    });

    // A CLI host has no runtime permission prompts
    let mut controller = MonitoringController::with_parts(
        &config,
        feed,
        location,
        messenger,
        Arc::new(notifier),
        ContactStore::new(),
        Permissions::all_granted(),
    )?
    .exit_when_feed_ends(args.source == Source::Replay);
    if let Some(path) = &args.status_file {
        controller = controller.with_status_file(path.clone());
    }

    let (cmd_tx, cmd_rx) = mpsc::channel::<ControlCommand>(16);
    let mut contacts = args.contacts.iter().cloned();
    cmd_tx
        .send(ControlCommand::SaveContacts(contacts.next(), contacts.next()))
        .await?;
    cmd_tx.send(ControlCommand::Start).await?;

    let monitor = tokio::spawn(controller.run(cmd_rx));

    let ctrl_c_tx = cmd_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n[{}] Interrupted, stopping...", ts_now());
            let _ = ctrl_c_tx.send(ControlCommand::Shutdown).await;
        }
    });

    #[cfg(unix)]
    spawn_lifecycle_signals(cmd_tx.clone())?;

    if args.duration > 0 {
        let duration_tx = cmd_tx.clone();
        let duration = args.duration;
        tokio::spawn(async move {
            sleep(Duration::from_secs(duration)).await;
            println!("[{}] Duration reached, stopping...", ts_now());
            let _ = duration_tx.send(ControlCommand::Shutdown).await;
        });
    }
    drop(cmd_tx);

    let metadata = monitor.await??;
    // the controller and every notifier clone are gone; print what is queued
    notice_handle.await?;

    println!("[{}] Monitoring stopped", ts_now());
    println!("  Samples: {} ({} dropped during alert cycles)", metadata.samples_received, metadata.samples_dropped);
    println!("  Peak: {:.2} m/s²", metadata.peak_magnitude);
    println!("  Accidents detected: {}", metadata.accidents_detected);
    println!(
        "  Alerts dispatched: {} (messages sent {}, failed {})",
        metadata.alerts_dispatched, metadata.messages_sent, metadata.messages_failed
    );
    if let Some(outcome) = &metadata.last_outcome {
        println!("  Last cycle: {}", outcome);
    }
    if let Some(path) = &args.status_file {
        println!("  Status: {}", path.display());
    }

    Ok(())
}

/// SIGUSR1/SIGUSR2 stand in for the host leaving/returning to the foreground
#[cfg(unix)]
fn spawn_lifecycle_signals(tx: mpsc::Sender<ControlCommand>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut background = signal(SignalKind::user_defined1())?;
    let mut foreground = signal(SignalKind::user_defined2())?;
    tokio::spawn(async move {
        loop {
            let command = tokio::select! {
                Some(_) = background.recv() => ControlCommand::Pause,
                Some(_) = foreground.recv() => ControlCommand::Resume,
                else => break,
            };
            println!("[{}] {:?}", ts_now(), command);
            if tx.send(command).await.is_err() {
                break;
            }
        }
    });
    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
