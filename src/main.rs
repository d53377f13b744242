//! BME69x Agent CLI
//!
//! Runs the heater duty-cycle and fusion control loop against a sensor.

use anyhow::{bail, Context, Result};
use bme69x_agent::{
    config::Config,
    core::{HeaterSetup, Scheduler, SensorSession, SessionLog},
    fusion::{FusedSample, FusionProfile, SimulatedEngine, MAX_CONFIG_SIZE},
    persistence::{strip_legacy_header, BlobStore},
    SimulatedSensor, VERSION,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "bme69x")]
#[command(version = VERSION)]
#[command(about = "Heater duty-cycle and sensor-fusion agent for BME68x/69x gas sensors", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fusion control loop until Ctrl+C
    Run {
        /// Fusion profile (overrides the config file)
        #[arg(long, value_enum)]
        profile: Option<ProfileArg>,

        /// Stop after this many fused samples
        #[arg(long)]
        samples: Option<u64>,

        /// Do not load or save fusion configuration and state
        #[arg(long)]
        no_persist: bool,
    },

    /// Run one raw measurement cycle and print the records
    Measure {
        #[arg(long, value_enum, default_value = "forced")]
        mode: ModeArg,

        /// Heater temperatures in °C, comma separated
        #[arg(long, value_delimiter = ',', default_value = "300")]
        temperatures: Vec<u16>,

        /// Heater durations, comma separated (ms, or cycle multipliers in parallel mode)
        #[arg(long, value_delimiter = ',', default_value = "100")]
        durations: Vec<u16>,
    },

    /// Check a fusion configuration file
    InspectConfig {
        path: PathBuf,
    },

    /// Show cumulative session statistics
    Status,

    /// Show where configuration, blobs and exports live
    Paths,

    /// Show configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    AirQuality,
    GasClasses,
}

impl From<ProfileArg> for FusionProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::AirQuality => FusionProfile::AirQuality,
            ProfileArg::GasClasses => FusionProfile::GasClasses,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Forced,
    Parallel,
    Sequential,
}

/// One exported run.
#[derive(Serialize)]
struct RunExport<'a> {
    run_id: Uuid,
    sensor_id: &'a str,
    profile: FusionProfile,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    samples: &'a [FusedSample],
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = match cli.command {
        Commands::Run {
            profile,
            samples,
            no_persist,
        } => cmd_run(profile.map(Into::into), samples, !no_persist),
        Commands::Measure {
            mode,
            temperatures,
            durations,
        } => cmd_measure(mode, temperatures, durations),
        Commands::InspectConfig { path } => cmd_inspect_config(path),
        Commands::Status => cmd_status(),
        Commands::Paths => cmd_paths(),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_session(config: &Config) -> Result<SensorSession<SimulatedSensor, SimulatedEngine>> {
    let device = SimulatedSensor::new(config.sensor.variant_id).with_real_delays(true);
    let engine = SimulatedEngine::new(config.profile);
    let scheduler = match config.poll_limit {
        Some(limit) => Scheduler::with_poll_limit(limit),
        None => Scheduler::unlimited(),
    };

    let mut session = SensorSession::new(device, engine, config.sensor_id())
        .context("failed to initialize sensor session")?
        .with_scheduler(scheduler)
        .with_log(SessionLog::with_persistence(config.stats_path()));
    session.set_temp_offset(config.temp_offset);
    Ok(session)
}

fn cmd_run(profile: Option<FusionProfile>, max_samples: Option<u64>, persist: bool) -> Result<()> {
    println!("BME69x Agent v{VERSION}");
    println!();

    let mut config = Config::load().unwrap_or_default();
    if let Some(profile) = profile {
        config.profile = profile;
    }
    if let Err(e) = config.ensure_directories() {
        warn!(error = %e, "could not create directories");
    }

    let store = BlobStore::new(&config.data_path);
    let mut session = open_session(&config)?;
    let unique_id = session.sensor_unique_id()?;

    println!("Sensor: {} ({})", session.sensor_id(), session.variant());
    println!("  Unique id: 0x{unique_id:08x}");
    println!("  Engine version: {}", session.engine_version());
    println!("  Profile: {}", config.profile);
    println!("  Temperature offset: {} °C", config.temp_offset);
    println!();

    if persist {
        session
            .load_config(&store)
            .context("failed to load fusion configuration")?;
        session
            .load_state(&store)
            .context("failed to load fusion state")?;
    }
    session.subscribe_profile(config.profile, config.sample_rate)?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let mut samples: Vec<FusedSample> = Vec::new();
    info!(%run_id, "control loop started");
    println!("Running. Press Ctrl+C to stop.");

    let mut loop_error = None;
    while running.load(Ordering::SeqCst) {
        if max_samples.is_some_and(|max| samples.len() as u64 >= max) {
            break;
        }

        let now = session.now_ns();
        let wait_ns = session.next_call_ns() - now;
        if wait_ns > 0 {
            let wait = Duration::from_nanos(wait_ns as u64).min(Duration::from_millis(100));
            thread::sleep(wait);
            continue;
        }

        match session.run_fusion(now) {
            Ok(batch) => {
                for sample in &batch {
                    print_sample(sample);
                }
                samples.extend(batch);
            }
            Err(e) => {
                loop_error = Some(e);
                break;
            }
        }
    }

    println!();
    println!("Stopping...");

    if persist {
        match session.save_state(&store) {
            Ok(path) => println!("Saved fusion state to {path:?}"),
            Err(e) => eprintln!("Error saving fusion state: {e}"),
        }
    }
    if !samples.is_empty() {
        export_run(&config, &session, run_id, started_at, &samples)?;
    }
    if let Err(e) = session.log().save() {
        warn!(error = %e, "could not save session stats");
    }

    println!();
    println!("{}", session.log().summary());

    match loop_error {
        Some(e) => Err(e).context("control loop aborted"),
        None => Ok(()),
    }
}

fn print_sample(sample: &FusedSample) {
    let line = sample
        .to_flat_map()
        .iter()
        .map(|(name, value)| format!("{name}={value:.2}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!("[{}] {line}", sample.sample_nr);
}

fn export_run(
    config: &Config,
    session: &SensorSession<SimulatedSensor, SimulatedEngine>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    samples: &[FusedSample],
) -> Result<()> {
    let export_path = config.export_path.join(format!(
        "session_{}.json",
        started_at.format("%Y%m%d_%H%M%S")
    ));
    let export = RunExport {
        run_id,
        sensor_id: session.sensor_id(),
        profile: session.profile(),
        started_at,
        finished_at: Utc::now(),
        samples,
    };

    let json = serde_json::to_string_pretty(&export).context("failed to serialize samples")?;
    std::fs::write(&export_path, json)
        .with_context(|| format!("failed to write {export_path:?}"))?;
    println!("Exported {} samples to {:?}", samples.len(), export_path);
    Ok(())
}

fn cmd_measure(mode: ModeArg, temperatures: Vec<u16>, durations: Vec<u16>) -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let mut session = open_session(&config)?;

    let setup = match mode {
        ModeArg::Forced => {
            let (Some(&temperature), Some(&duration)) = (temperatures.first(), durations.first())
            else {
                bail!("forced mode needs one temperature and one duration");
            };
            HeaterSetup::Forced {
                temperature,
                duration,
            }
        }
        ModeArg::Parallel => HeaterSetup::Parallel {
            temperatures,
            durations,
        },
        ModeArg::Sequential => HeaterSetup::Sequential {
            temperatures,
            durations,
        },
    };
    session.configure_heater(setup)?;

    let records = session.measure()?;
    if records.is_empty() {
        println!("No valid fields in this cycle.");
    }
    for record in &records {
        println!(
            "[{}] T={:.2} °C  P={:.2} hPa  H={:.2} %  G={:.2} kΩ  gas_index={} meas_index={} status=0x{:02x}",
            record.sample_nr,
            record.temperature,
            record.pressure,
            record.humidity,
            record.gas_resistance,
            record.gas_index,
            record.meas_index,
            record.status
        );
    }
    if let Err(e) = session.log().save() {
        warn!(error = %e, "could not save session stats");
    }
    Ok(())
}

fn cmd_inspect_config(path: PathBuf) -> Result<()> {
    let raw = std::fs::read(&path).with_context(|| format!("failed to read {path:?}"))?;
    let blob = strip_legacy_header(&raw, MAX_CONFIG_SIZE);

    println!("Fusion configuration: {path:?}");
    println!("  File size: {} bytes", raw.len());
    println!(
        "  Legacy length header: {}",
        if blob.len() != raw.len() {
            "present (stripped)"
        } else {
            "absent"
        }
    );
    println!("  Payload: {} bytes", blob.len());
    if blob.is_empty() {
        bail!("configuration file is empty");
    }
    if blob.len() > MAX_CONFIG_SIZE {
        bail!(
            "payload exceeds the {MAX_CONFIG_SIZE} byte limit by {} bytes",
            blob.len() - MAX_CONFIG_SIZE
        );
    }
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let store = BlobStore::new(&config.data_path);
    let sensor_id = config.sensor_id();

    println!("BME69x Agent Status");
    println!("===================");
    println!();
    println!("Sensor: {sensor_id}");
    println!(
        "  Saved configuration: {}",
        present(store.config_path(&sensor_id).exists())
    );
    println!(
        "  Saved state: {}",
        present(store.state_path(&sensor_id).exists())
    );
    println!();

    let stats_path = config.stats_path();
    if stats_path.exists() {
        let log = SessionLog::with_persistence(stats_path);
        println!("Cumulative {}", log.summary());
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn present(exists: bool) -> &'static str {
    if exists {
        "yes"
    } else {
        "no"
    }
}

fn cmd_paths() -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let store = BlobStore::new(&config.data_path);
    let sensor_id = config.sensor_id();

    println!("Config file:   {:?}", Config::config_path());
    println!("Blob dir:      {:?}", store.dir());
    println!("  config blob: {:?}", store.config_path(&sensor_id));
    println!("  state blob:  {:?}", store.state_path(&sensor_id));
    println!("Exports:       {:?}", config.export_path);
    println!("Stats:         {:?}", config.stats_path());
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("error setting Ctrl+C handler")
}
