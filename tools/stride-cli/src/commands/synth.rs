//! Write a synthetic recording for an item.
//!
//! Each script performs the item well enough to score near the top of its
//! rubric, which makes the output a quick end-to-end check of `score` and
//! `replay`.

use std::path::PathBuf;

use stride_pose_model::item::{TargetPosture, TestItem};
use stride_pose_model::landmark::{BodyPoint, FrameRecording, FrameStreamHeader, Side};
use stride_pose_model::synthetic::PoseBuilder;

pub fn run(item: String, output: PathBuf, fps: u32) -> anyhow::Result<()> {
    let item = super::parse_item(&item)?;
    let mut script = Script::new(fps);
    perform(item, &mut script)?;

    let recording = FrameRecording {
        header: Some(FrameStreamHeader::new(16.0 / 9.0, script.fps)),
        frames: script.into_frames(),
    };
    recording
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write recording: {e}"))?;

    println!(
        "Wrote {} frames ({:.1}s) for {} to: {}",
        recording.frames.len(),
        recording.duration_secs(),
        item.label(),
        output.display()
    );
    Ok(())
}

struct Script {
    fps: u32,
    poses: Vec<PoseBuilder>,
}

impl Script {
    fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            poses: Vec::new(),
        }
    }

    fn frame_count(&self, secs: f64) -> usize {
        (secs * self.fps as f64).round().max(1.0) as usize
    }

    fn hold(&mut self, pose: &PoseBuilder, secs: f64) -> &mut Self {
        let n = self.frame_count(secs);
        self.poses.extend(std::iter::repeat(pose.clone()).take(n));
        self
    }

    /// Pose each frame from its progress through the clip, in `[0, 1]`.
    fn ramp(&mut self, secs: f64, pose: impl Fn(f64) -> PoseBuilder) -> &mut Self {
        let n = self.frame_count(secs);
        for i in 0..n {
            let progress = if n > 1 { i as f64 / (n - 1) as f64 } else { 1.0 };
            self.poses.push(pose(progress));
        }
        self
    }

    fn into_frames(self) -> Vec<stride_pose_model::landmark::LandmarkFrame> {
        let interval_ms = 1000 / self.fps as u64;
        self.poses
            .iter()
            .enumerate()
            .map(|(i, pose)| pose.build(i as u64 * interval_ms))
            .collect()
    }
}

fn standing() -> PoseBuilder {
    PoseBuilder::standing_front()
}

fn with(mut pose: PoseBuilder, edit: impl FnOnce(&mut PoseBuilder)) -> PoseBuilder {
    edit(&mut pose);
    pose
}

fn perform(item: TestItem, script: &mut Script) -> anyhow::Result<()> {
    match item {
        TestItem::SitToStand => {
            let risen = with(standing(), |p| {
                p.set_wrist(Side::Left, 0.52, 0.32)
                    .set_wrist(Side::Right, 0.48, 0.32);
            });
            script
                .hold(&PoseBuilder::sitting_side(), 1.5)
                .hold(&risen, 2.0);
        }
        TestItem::ArmReach => {
            let reach = |dx: f64| {
                with(PoseBuilder::standing_side(), |p| {
                    p.set_wrist(Side::Left, 0.51 + dx, 0.30)
                        .set_wrist(Side::Right, 0.49 + dx, 0.30);
                })
            };
            script
                .hold(&reach(0.0), 1.0)
                .ramp(1.0, |s| reach(0.15 * s))
                .hold(&reach(0.15), 0.5)
                .ramp(1.0, |s| reach(0.15 * (1.0 - s)))
                .hold(&reach(0.0), 1.0);
        }
        TestItem::FloorPickUp => {
            script
                .hold(&PoseBuilder::standing_side(), 1.0)
                .hold(&PoseBuilder::bending_side(), 1.5)
                .hold(&PoseBuilder::standing_side(), 1.5);
        }
        TestItem::LookBehind => {
            let look = |side: Side, shift: f64| {
                with(standing(), |p| {
                    p.shift_x(shift)
                        .set_shoulder_width(0.08)
                        .set_depth(side.shoulder(), 0.1);
                })
            };
            script
                .hold(&standing(), 1.0)
                .hold(&look(Side::Left, 0.03), 1.0)
                .hold(&standing(), 1.0)
                .hold(&look(Side::Right, -0.03), 1.0)
                .hold(&standing(), 1.0);
        }
        TestItem::Turn360 => {
            let narrowed = |width: f64| with(standing(), |p| {
                p.set_shoulder_width(width);
            });
            let back = with(standing(), |p| {
                p.set_visibility(BodyPoint::Nose, 0.1);
            });
            script.hold(&standing(), 1.0);
            for _ in 0..2 {
                script
                    .hold(&narrowed(0.08), 0.5)
                    .hold(&narrowed(0.03), 0.5)
                    .hold(&back, 1.0)
                    .hold(&narrowed(0.03), 0.5)
                    .hold(&narrowed(0.08), 0.5)
                    .hold(&standing(), 3.5);
            }
        }
        TestItem::AlternatingStep => {
            script.hold(&standing(), 1.0);
            for i in 0..8 {
                let side = if i % 2 == 0 { Side::Left } else { Side::Right };
                let up = with(standing(), |p| {
                    p.lift_foot(side, 0.08);
                });
                script.hold(&up, 0.3).hold(&standing(), 0.3);
            }
        }
        TestItem::TandemStance => {
            let tandem = with(standing(), |p| {
                p.move_foot(Side::Right, 0.075, -0.04);
            });
            script.hold(&standing(), 1.0).hold(&tandem, 31.0);
        }
        TestItem::SingleLegStance => {
            let lifted = with(standing(), |p| {
                p.lift_foot(Side::Left, 0.05);
            });
            script.hold(&standing(), 1.0).hold(&lifted, 11.0);
        }
        other => {
            let (Some(target), Some(secs)) =
                (other.target_posture(), other.prescribed_duration_secs())
            else {
                anyhow::bail!("{other} is scored from a stopwatch; use `stride timed`");
            };
            match target {
                TargetPosture::Standing => {
                    script.hold(&standing(), secs + 1.0);
                }
                TargetPosture::Sitting => {
                    // Start upright so transitions have something to smooth over.
                    script
                        .hold(&standing(), 2.0)
                        .hold(&PoseBuilder::sitting_side(), secs + 3.0);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_assessment_core::session::Assessment;

    fn score(item: TestItem) -> u8 {
        let mut script = Script::new(30);
        perform(item, &mut script).unwrap();
        let mut assessment = Assessment::default();
        assessment.start(item).unwrap();
        for frame in script.into_frames() {
            assessment.process(&frame).unwrap();
        }
        assessment.finish().unwrap().score
    }

    #[test]
    fn test_single_leg_script_scores_four() {
        assert_eq!(score(TestItem::SingleLegStance), 4);
    }

    #[test]
    fn test_sit_to_stand_script_scores_four() {
        assert_eq!(score(TestItem::SitToStand), 4);
    }

    #[test]
    fn test_timed_items_have_no_script() {
        let mut script = Script::new(30);
        assert!(perform(TestItem::TimedUpAndGo, &mut script).is_err());
    }

    #[test]
    fn test_ramp_reaches_both_ends() {
        let mut script = Script::new(10);
        script.ramp(1.0, |s| with(standing(), |p| {
            p.shift_x(0.1 * s);
        }));
        let frames = script.into_frames();
        assert_eq!(frames.len(), 10);
        let first = frames[0].point(BodyPoint::Nose).x;
        let last = frames[9].point(BodyPoint::Nose).x;
        assert!((last - first - 0.1).abs() < 1e-9);
    }
}
