//! Stride CLI: offline scoring and replay of landmark recordings.
//!
//! Usage:
//!   stride score <FRAMES> --item <ITEM>    Score one item from a recording
//!   stride replay <FRAMES> --item <ITEM>   Stream a recording with live progress
//!   stride timed <ITEM> <SECONDS>          Score a timed test
//!   stride items                           List the test catalogue
//!   stride summary <REPORT>...             Total BBS reports
//!   stride synth <ITEM> <OUT>              Write a synthetic recording
//!   stride config                          Show the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stride",
    about = "Berg Balance Scale scoring from pose landmark recordings",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one test item from a landmark recording
    Score {
        /// Path to the JSONL landmark recording
        frames: PathBuf,

        /// Item slug, snake_case name, or BBS number
        #[arg(short, long)]
        item: String,

        /// Patient height in centimeters (enables calibration)
        #[arg(long)]
        height: Option<f64>,

        /// Frame width / height; defaults to the recording header, then config
        #[arg(long)]
        aspect: Option<f64>,

        /// JSON file overriding analyzer thresholds
        #[arg(long)]
        tuning: Option<PathBuf>,

        /// Record that the patient lost balance at the end of the recording
        #[arg(long)]
        lost_balance: bool,

        /// Record that the patient needed physical assistance
        #[arg(long)]
        assisted: bool,

        /// Write the report JSON here instead of the reports directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stream a recording through the analyzer with live progress
    Replay {
        /// Path to the JSONL landmark recording
        frames: PathBuf,

        /// Item slug, snake_case name, or BBS number
        #[arg(short, long)]
        item: String,

        /// Patient height in centimeters
        #[arg(long)]
        height: Option<f64>,

        /// Frame width / height; defaults to the recording header, then config
        #[arg(long)]
        aspect: Option<f64>,

        /// JSON file overriding analyzer thresholds
        #[arg(long)]
        tuning: Option<PathBuf>,

        /// Pace frames at their recorded timestamps
        #[arg(long)]
        realtime: bool,
    },

    /// Score a timed test from a stopwatch reading
    Timed {
        /// `tug` or `10mwt`
        item: String,

        /// Elapsed time in seconds
        seconds: f64,

        /// Write the report JSON here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the test catalogue
    Items,

    /// Total a set of BBS reports
    Summary {
        /// Report JSON files
        #[arg(required = true)]
        reports: Vec<PathBuf>,
    },

    /// Write a synthetic recording for an item
    Synth {
        /// Item slug, snake_case name, or BBS number
        item: String,

        /// Output JSONL path
        output: PathBuf,

        /// Frame rate of the generated stream
        #[arg(long, default_value = "30")]
        fps: u32,
    },

    /// Show or initialize the configuration
    Config {
        /// Write the effective configuration to disk
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = stride_common::config::AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    stride_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Score {
            frames,
            item,
            height,
            aspect,
            tuning,
            lost_balance,
            assisted,
            output,
        } => commands::score::run(
            &config,
            commands::score::ScoreArgs {
                frames,
                item,
                height,
                aspect,
                tuning,
                lost_balance,
                assisted,
                output,
            },
        ),
        Commands::Replay {
            frames,
            item,
            height,
            aspect,
            tuning,
            realtime,
        } => {
            commands::replay::run(
                &config,
                commands::replay::ReplayArgs {
                    frames,
                    item,
                    height,
                    aspect,
                    tuning,
                    realtime,
                },
            )
            .await
        }
        Commands::Timed {
            item,
            seconds,
            output,
        } => commands::timed::run(&config, item, seconds, output),
        Commands::Items => commands::items::run(),
        Commands::Summary { reports } => commands::summary::run(reports),
        Commands::Synth { item, output, fps } => commands::synth::run(item, output, fps),
        Commands::Config { init } => commands::config::run(&config, init),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_accepts_score_overrides() {
        let cli = Cli::try_parse_from([
            "stride", "replay", "leg.jsonl", "--item", "14", "--aspect", "1.5", "--tuning",
            "tuning.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Replay { aspect, tuning, .. } => {
                assert_eq!(aspect, Some(1.5));
                assert_eq!(tuning, Some(PathBuf::from("tuning.json")));
            }
            _ => panic!("expected replay"),
        }
    }
}
