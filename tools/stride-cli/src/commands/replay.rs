//! Stream a recording through the analyzer with live progress.
//!
//! Frames travel from a producer task over a channel of capacity one, so
//! at most one frame waits while the analyzer works, the same contract a
//! live detector would follow.

use std::path::PathBuf;
use std::time::Duration;

use stride_assessment_core::calibration::Calibrator;
use stride_assessment_core::session::Assessment;
use stride_common::clock::{ms_to_secs, RateController};
use stride_common::config::AppConfig;
use stride_pose_model::landmark::{FrameRecording, LandmarkFrame};
use tokio::sync::mpsc;

pub struct ReplayArgs {
    pub frames: PathBuf,
    pub item: String,
    pub height: Option<f64>,
    pub aspect: Option<f64>,
    pub tuning: Option<PathBuf>,
    pub realtime: bool,
}

pub async fn run(config: &AppConfig, args: ReplayArgs) -> anyhow::Result<()> {
    let item = super::parse_item(&args.item)?;
    let recording = FrameRecording::load(&args.frames)
        .map_err(|e| anyhow::anyhow!("Failed to load recording: {e}"))?;
    let tuning = super::build_tuning(config, args.tuning.as_deref())?;
    let aspect = args
        .aspect
        .or(recording.header.as_ref().map(|h| h.aspect_ratio))
        .unwrap_or(config.assessment.aspect_ratio);
    let height = args.height.or(config.assessment.patient_height_cm);
    let realtime = args.realtime || config.assessment.realtime_replay;

    let mut assessment = Assessment::new(Calibrator::new(height, aspect), tuning);
    assessment.start(item)?;

    println!("Replaying {} frames for {}", recording.frames.len(), item.label());
    if realtime {
        println!("  Pacing at recorded timestamps. Press Ctrl+C to stop.");
    }
    println!();

    let (tx, mut rx) = mpsc::channel::<LandmarkFrame>(1);
    let producer = tokio::spawn(produce(recording.frames, tx, realtime));

    let mut display = RateController::new(config.assessment.display_rate_hz);
    let mut skipped = 0usize;
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                let t = frame.timestamp_ms;
                match assessment.process(&frame)? {
                    Some(update) => {
                        if display.should_tick(t) || update.complete {
                            let score = assessment.score()?;
                            println!(
                                "  [{:>7.2}s] {:<18} provisional {}/4  {}",
                                ms_to_secs(t),
                                update.phase,
                                score.score,
                                score.reason
                            );
                        }
                        if update.complete {
                            break;
                        }
                    }
                    None => skipped += 1,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nInterrupted; finishing the item.");
                break;
            }
        }
    }
    // Dropping the receiver ends the producer at its next send.
    drop(rx);
    producer.await?;

    if skipped > 0 {
        tracing::warn!(skipped, "Frames skipped during replay");
    }

    let report = assessment.finish()?;
    println!();
    super::print_report(&report);
    Ok(())
}

async fn produce(frames: Vec<LandmarkFrame>, tx: mpsc::Sender<LandmarkFrame>, realtime: bool) {
    let mut previous_ms: Option<u64> = None;
    for frame in frames {
        if realtime {
            if let Some(previous) = previous_ms {
                let gap = frame.timestamp_ms.saturating_sub(previous);
                tokio::time::sleep(Duration::from_millis(gap)).await;
            }
            previous_ms = Some(frame.timestamp_ms);
        }
        if tx.send(frame).await.is_err() {
            tracing::debug!("Replay consumer stopped; ending producer");
            return;
        }
    }
}
