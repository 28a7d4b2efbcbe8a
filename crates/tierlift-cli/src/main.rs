//! tierlift — replay recorded stage outputs through the escalation ladder
//!
//! # Usage
//!
//! ```bash
//! # Replay recordings in ./recordings (fast.json, balanced.json, ...)
//! tierlift run --fixtures ./recordings
//!
//! # Model-size ladder with custom config and cheap input signals
//! tierlift run --preset model --config ladder.toml --fixtures ./rec \
//!     --duration 5400 --size 43200000 --speakers 5
//!
//! # Show the resolved tier catalog
//! tierlift catalog --preset audio
//!
//! # Summarize a JSON-lines file of selection samples
//! tierlift stats samples.jsonl
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`), logs go to stderr.

mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tierlift::{
    CheapSignals, EscalationController, EscalationStats, LadderConfig, SelectionSample,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use replay::ReplayExecutor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one selection against recorded tier outputs
    Run {
        #[command(flatten)]
        ladder: LadderArgs,

        /// Directory holding one `<tier>.json` recording per tier
        #[arg(long)]
        fixtures: PathBuf,

        /// Media duration in seconds
        #[arg(long)]
        duration: Option<f64>,

        /// Input file size in bytes
        #[arg(long)]
        size: Option<u64>,

        /// Estimated speaker count
        #[arg(long)]
        speakers: Option<u32>,

        /// Coarse complexity hint in [0, 1]
        #[arg(long)]
        complexity: Option<f64>,

        /// Simulated processing time per unit of tier cost, in milliseconds
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,

        /// Omit the raw transcript payload from the printed result
        #[arg(long, default_value_t = false)]
        no_payload: bool,

        /// Append a selection sample to this JSON-lines file
        #[arg(long)]
        record_sample: Option<PathBuf>,
    },

    /// Print the resolved tier catalog and configuration
    Catalog {
        #[command(flatten)]
        ladder: LadderArgs,
    },

    /// Summarize selection samples from a JSON-lines file
    Stats {
        samples: PathBuf,

        #[command(flatten)]
        ladder: LadderArgs,
    },
}

#[derive(clap::Args, Debug)]
struct LadderArgs {
    /// Built-in tier ladder used when no config file is given
    #[arg(long, value_enum, default_value_t = Preset::Audio)]
    preset: Preset,

    /// TOML config file (overrides the preset)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    Audio,
    Model,
}

impl LadderArgs {
    fn load(&self) -> Result<LadderConfig> {
        let config = match &self.config {
            Some(path) => LadderConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => match self.preset {
                Preset::Audio => LadderConfig::audio_quality(),
                Preset::Model => LadderConfig::model_quality(),
            },
        };
        config
            .with_env_overrides()
            .context("Invalid TIERLIFT_* environment override")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Run {
            ladder,
            fixtures,
            duration,
            size,
            speakers,
            complexity,
            latency_ms,
            no_payload,
            record_sample,
        } => {
            let controller = EscalationController::new(ladder.load()?)
                .context("Invalid ladder configuration")?;
            let signals = CheapSignals {
                duration_secs: duration,
                file_size_bytes: size,
                speaker_count: speakers,
                complexity_hint: complexity,
            };
            let executor =
                ReplayExecutor::new(&fixtures).with_latency(Duration::from_millis(latency_ms));

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling selection");
                    on_ctrl_c.cancel();
                }
            });

            let mut result = controller
                .run_with_cancel(&signals, &executor, &cancel)
                .await
                .context("Selection failed")?;
            info!("{}", result.summary());

            if let Some(path) = record_sample {
                append_sample(&path, &SelectionSample::from(&result))?;
            }
            if no_payload {
                result.output.payload = serde_json::Value::Null;
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Catalog { ladder } => {
            let config = ladder.load()?;
            config.validate().context("Invalid ladder configuration")?;
            let catalog = config.catalog()?;
            println!("{}", catalog.summary());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Command::Stats { samples, ladder } => {
            let config = ladder.load()?;
            let catalog = config.catalog().context("Invalid ladder configuration")?;
            let samples = read_samples(&samples)?;
            let stats = EscalationStats::from_samples(&samples, &catalog.cheapest().name);
            info!("{}", stats.summary());
            if stats.suggests_skipping_cheapest() {
                warn!(
                    tier = %catalog.cheapest().name,
                    rate = stats.cheapest_escalation_rate,
                    "cheapest tier almost always escalates; consider raising the starting tier"
                );
            }
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn append_sample(path: &Path, sample: &SelectionSample) -> Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{}", serde_json::to_string(sample)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_samples(path: &Path) -> Result<Vec<SelectionSample>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid selection sample", path.display(), n + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tier: &str) -> SelectionSample {
        SelectionSample {
            final_tier: tier.to_string(),
            first_tier: "fast".to_string(),
            attempts: 1,
            escalations: 0,
            failed_attempts: 0,
            quality: 0.85,
            time_saved_estimate: 0.75,
            forced: false,
        }
    }

    #[test]
    fn test_samples_roundtrip_through_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        append_sample(&path, &sample("fast")).unwrap();
        append_sample(&path, &sample("high")).unwrap();

        let samples = read_samples(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].final_tier, "high");
    }

    #[test]
    fn test_bad_sample_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        std::fs::write(&path, "\n{\"nope\": 1}\n").unwrap();
        let err = read_samples(&path).unwrap_err();
        assert!(format!("{err}").contains(":2:"), "err: {err}");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "tierlift",
            "run",
            "--fixtures",
            "rec",
            "--preset",
            "model",
            "--speakers",
            "3",
        ])
        .unwrap();
        match args.command {
            Command::Run {
                ladder, speakers, ..
            } => {
                assert!(matches!(ladder.preset, Preset::Model));
                assert_eq!(speakers, Some(3));
                assert_eq!(ladder.load().unwrap().tiers[0].name, "tiny");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
