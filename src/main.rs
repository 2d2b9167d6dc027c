use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use gesture_collector::config::CollectorConfig;
use gesture_collector::core::{BucketKey, Hand};
use gesture_collector::hal::mock::SimulatedGestureDevice;
use gesture_collector::hal::{StreamTransport, Transport};
use gesture_collector::session::DeviceSession;
use gesture_collector::store::GestureStore;

#[derive(Parser, Debug)]
#[command(name = "gesture-collector")]
#[command(about = "Collect labelled photodiode gesture recordings into a dataset")]
struct Cli {
    /// Collector configuration file (created with defaults if missing)
    #[arg(short, long, default_value = "collector.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct LinkArgs {
    /// Serial device node; overrides the configured port
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate; overrides the configured rate
    #[arg(long)]
    baud: Option<u32>,

    /// Use the in-memory simulated device instead of hardware
    #[arg(long)]
    simulate: bool,
}

#[derive(Args, Debug, Clone)]
struct BucketArgs {
    /// Gesture category (gestures, digits, letters, ...)
    #[arg(short = 't', long)]
    gesture_type: String,

    /// Gesture label within the category
    #[arg(short, long)]
    gesture: String,

    /// left or right
    #[arg(long, default_value = "right")]
    hand: Hand,

    #[arg(long)]
    candidate: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recalibrate the device and print the resistance
    Calibrate {
        #[command(flatten)]
        link: LinkArgs,
    },
    /// Record one gesture and append it to the dataset
    Measure {
        #[command(flatten)]
        link: LinkArgs,
        #[command(flatten)]
        bucket: BucketArgs,
        /// Sample rate in Hz; defaults per gesture type
        #[arg(long)]
        rate: Option<u32>,
        /// Duration in milliseconds; defaults per gesture type
        #[arg(long)]
        duration_ms: Option<u32>,
        /// Known resistance from an earlier calibration
        #[arg(long)]
        resistance: Option<u32>,
        #[arg(long)]
        no_save: bool,
        /// Log every sample as it arrives
        #[arg(long)]
        log_samples: bool,
    },
    /// List all buckets in the dataset
    List,
    /// Summarize the records of one bucket
    Show {
        #[command(flatten)]
        bucket: BucketArgs,
    },
    /// Remove one record (by timestamp) from a bucket
    Remove {
        #[command(flatten)]
        bucket: BucketArgs,
        #[arg(long)]
        timestamp: f64,
    },
    /// Move one record (by timestamp) to another gesture label or candidate
    Move {
        #[command(flatten)]
        bucket: BucketArgs,
        #[arg(long)]
        timestamp: f64,
        #[arg(long)]
        to_gesture: Option<String>,
        #[arg(long)]
        to_hand: Option<Hand>,
        #[arg(long)]
        to_candidate: Option<String>,
    },
}

impl BucketArgs {
    fn key(&self, config: &CollectorConfig) -> BucketKey {
        let candidate = self
            .candidate
            .clone()
            .unwrap_or_else(|| config.default_candidate.clone());
        BucketKey::new(&self.gesture_type, &self.gesture, self.hand, candidate)
    }
}

fn open_session(
    config: &CollectorConfig,
    link: &LinkArgs,
) -> Result<DeviceSession<Box<dyn Transport>>> {
    let transport: Box<dyn Transport> = if link.simulate {
        log::info!("Using simulated gesture device");
        Box::new(SimulatedGestureDevice::new())
    } else {
        let port = link
            .port
            .clone()
            .or_else(|| config.serial_port.clone())
            .context("No serial port given; pass --port or set serial_port in the config")?;
        let baud_rate = link.baud.unwrap_or(config.baud_rate);
        Box::new(
            StreamTransport::open_serial(&port, baud_rate)
                .with_context(|| format!("Failed to open serial port {}", port))?,
        )
    };

    let mut session = DeviceSession::new(transport);
    if let Some(timeout) = config.read_timeout() {
        session = session.with_read_timeout(timeout);
    }
    Ok(session)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = CollectorConfig::load(&cli.config)
        .await
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;
    let store = GestureStore::new(&config.dataset_root);

    match cli.command {
        Command::Calibrate { link } => {
            let mut session = open_session(&config, &link)?;
            let resistance = session.recalibrate().await?;
            println!("Resistance: {} Ohms ({:.1} kOhm)", resistance, resistance as f64 / 1000.0);
            session.close().await?;
        }
        Command::Measure {
            link,
            bucket,
            rate,
            duration_ms,
            resistance,
            no_save,
            log_samples,
        } => {
            let defaults = config.defaults_for(&bucket.gesture_type);
            let (Some(rate), Some(duration_ms)) = (
                rate.or(defaults.map(|d| d.sample_rate)),
                duration_ms.or(defaults.map(|d| d.duration_ms)),
            ) else {
                bail!(
                    "Unknown gesture type '{}'; pass --rate and --duration-ms",
                    bucket.gesture_type
                );
            };

            let key = bucket.key(&config);
            let mut session = open_session(&config, &link)?;
            if let Some(r) = resistance {
                session = session.with_resistance(r);
            }

            tokio::time::sleep(Duration::from_millis(config.start_delay_ms)).await;
            log::info!(
                "Collecting '{}' ({}) for candidate '{}' with {}",
                key.target_gesture, key.gesture_type, key.candidate, key.hand
            );
            let (mut record, report) = session
                .measure_with_report(duration_ms as f64 / 1000.0, rate, log_samples)
                .await?;
            session.close().await?;

            record.set_metadata(key.candidate, key.hand, key.gesture_type, key.target_gesture);
            println!(
                "Recorded {} samples at {:.1} Hz (timestamp {})",
                record.data.len(),
                report.achieved_rate(),
                record.timestamp
            );
            if !no_save {
                let path = store.append(&record)?;
                println!("Saved to {}", path.display());
            }
        }
        Command::List => {
            for key in store.list_buckets()? {
                let count = store.read_all(&key)?.len();
                println!("{}  ({} records)", key, count);
            }
        }
        Command::Show { bucket } => {
            let key = bucket.key(&config);
            let records = store.read_all(&key)?;
            println!("{}: {} records", store.bucket_path(&key).display(), records.len());
            for (i, r) in records.iter().enumerate() {
                println!(
                    "[{}] timestamp={} samples={}/{} rate={} Hz duration={} s resistance={:.1} kOhm",
                    i,
                    r.timestamp,
                    r.data.len(),
                    r.samples,
                    r.sample_rate,
                    r.duration,
                    r.resistance as f64 / 1000.0
                );
            }
        }
        Command::Remove { bucket, timestamp } => {
            let key = bucket.key(&config);
            store.remove(&key, timestamp)?;
            println!("Removed record {} from {}", timestamp, key);
        }
        Command::Move {
            bucket,
            timestamp,
            to_gesture,
            to_hand,
            to_candidate,
        } => {
            let from = bucket.key(&config);
            let mut to = from.clone();
            if let Some(g) = to_gesture {
                to.target_gesture = g;
            }
            if let Some(h) = to_hand {
                to.hand = h;
            }
            if let Some(c) = to_candidate {
                to.candidate = c;
            }
            store.move_record(&from, timestamp, &to)?;
            println!("Moved record {} from {} to {}", timestamp, from, to);
        }
    }

    Ok(())
}
