//! Score one item from a landmark recording.

use std::path::PathBuf;

use stride_assessment_core::calibration::Calibrator;
use stride_assessment_core::session::Assessment;
use stride_common::config::AppConfig;
use stride_pose_model::landmark::FrameRecording;

pub struct ScoreArgs {
    pub frames: PathBuf,
    pub item: String,
    pub height: Option<f64>,
    pub aspect: Option<f64>,
    pub tuning: Option<PathBuf>,
    pub lost_balance: bool,
    pub assisted: bool,
    pub output: Option<PathBuf>,
}

pub fn run(config: &AppConfig, args: ScoreArgs) -> anyhow::Result<()> {
    let item = super::parse_item(&args.item)?;
    let recording = FrameRecording::load(&args.frames)
        .map_err(|e| anyhow::anyhow!("Failed to load recording: {e}"))?;
    let tuning = super::build_tuning(config, args.tuning.as_deref())?;

    let aspect = args
        .aspect
        .or(recording.header.as_ref().map(|h| h.aspect_ratio))
        .unwrap_or(config.assessment.aspect_ratio);
    let height = args.height.or(config.assessment.patient_height_cm);

    println!("Scoring {} from: {}", item.label(), args.frames.display());
    println!(
        "  {} frames over {:.1}s (aspect {aspect:.3})",
        recording.frames.len(),
        recording.duration_secs()
    );

    let mut assessment = Assessment::new(Calibrator::new(height, aspect), tuning);
    assessment.start(item)?;
    if args.assisted {
        assessment.set_assisted(true)?;
    }

    let mut skipped = 0usize;
    for frame in &recording.frames {
        if assessment.process(frame)?.is_none() {
            skipped += 1;
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "Frames skipped for low visibility or missing landmarks");
    }
    if args.lost_balance {
        assessment.set_lost_balance(true)?;
    }

    match (height, assessment.calibrator().profile()) {
        (Some(_), Some(profile)) => {
            println!("  Calibrated at {:.1} cm/unit", profile.scale_y)
        }
        (Some(_), None) => println!("  No frame was usable for calibration"),
        (None, _) => println!("  No patient height; distances are estimated"),
    }

    let report = assessment.finish()?;
    println!();
    super::print_report(&report);

    let path = super::save_report(config, &report, args.output)?;
    println!("\nReport saved to: {}", path.display());
    Ok(())
}
