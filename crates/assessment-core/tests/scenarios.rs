//! End-to-end assessment scenarios driven through [`Assessment`].

use stride_assessment_core::calibration::Calibrator;
use stride_assessment_core::config::AnalyzerTuning;
use stride_assessment_core::scoring::{
    score_arm_reach, score_tandem_stance, score_turn_360, ArmReachInput, StanceType, TandemInput,
    TurnInput, TurnOutcome,
};
use stride_assessment_core::session::Assessment;
use stride_pose_model::item::{AnalyzerKind, TestItem};
use stride_pose_model::landmark::{LandmarkFrame, Side};
use stride_pose_model::report::CompletionKind;
use stride_pose_model::synthetic::PoseBuilder;

fn feed(
    assessment: &mut Assessment,
    pose: &PoseBuilder,
    start: u64,
    step: u64,
    count: usize,
) -> u64 {
    let mut t = start;
    for _ in 0..count {
        assessment.process(&pose.build(t)).unwrap();
        t += step;
    }
    t
}

#[test]
fn sit_to_stand_without_hands_scores_four() {
    let mut assessment = Assessment::default();
    assessment.start(TestItem::SitToStand).unwrap();

    let mut standing = PoseBuilder::standing_front();
    standing
        .set_wrist(Side::Left, 0.52, 0.32)
        .set_wrist(Side::Right, 0.48, 0.32);

    let t = feed(&mut assessment, &PoseBuilder::sitting_side(), 0, 33, 20);
    feed(&mut assessment, &standing, t, 33, 15);

    assert_eq!(assessment.score().unwrap().score, 4);
    let report = assessment.finish().unwrap();
    assert_eq!(report.score, 4);
    assert_eq!(report.metadata.frames_processed, 35);
}

#[test]
fn arm_reach_rubric() {
    let reach = |feet_moved| ArmReachInput {
        max_reach_cm: 27.0,
        feet_moved,
        lost_balance: false,
    };
    let full = score_arm_reach(&reach(false));
    assert_eq!(full.score, 4);
    assert!(full.reason.contains("25cm"), "{}", full.reason);
    assert_eq!(score_arm_reach(&reach(true)).score, 3);
}

#[test]
fn tandem_and_turn_rubrics() {
    let tandem = TandemInput {
        best_stance_type: Some(StanceType::Tandem),
        max_duration_secs: 30.0,
        lost_balance: false,
    };
    assert_eq!(score_tandem_stance(&tandem).score, 4);

    let done = |secs| TurnOutcome {
        completed: true,
        elapsed_secs: secs,
    };
    let mut turn = TurnInput {
        first: done(3.5),
        second: done(3.9),
        lost_balance: false,
    };
    assert_eq!(score_turn_360(&turn).score, 4);
    turn.second = TurnOutcome::default();
    assert_eq!(score_turn_360(&turn).score, 1);
}

#[test]
fn tandem_stance_held_through_session() {
    let mut assessment = Assessment::default();
    assessment.start(TestItem::TandemStance).unwrap();

    let mut tandem = PoseBuilder::standing_front();
    tandem.move_foot(Side::Right, 0.075, -0.04);

    let t = feed(&mut assessment, &PoseBuilder::standing_front(), 0, 100, 10);
    feed(&mut assessment, &tandem, t, 100, 310);

    let report = assessment.finish().unwrap();
    assert_eq!(report.score, 4);
    assert_eq!(report.measurement["best_stance_type"], "tandem");
}

#[test]
fn single_leg_stance_ten_seconds() {
    let mut assessment = Assessment::default();
    assessment.start(TestItem::SingleLegStance).unwrap();

    let mut lifted = PoseBuilder::standing_front();
    lifted.lift_foot(Side::Left, 0.05);

    // Baseline confirmed at 500 ms; the lift starts at 1000 ms.
    let t = feed(&mut assessment, &PoseBuilder::standing_front(), 0, 100, 10);
    // 1000..=11400 ms
    feed(&mut assessment, &lifted, t, 100, 105);

    let report = assessment.finish().unwrap();
    let held = report.measurement["max_duration_secs"].as_f64().unwrap();
    assert!((held - 10.4).abs() < 1e-9, "{held}");
    assert_eq!(report.measurement["lifted_side"], "left");
    assert_eq!(report.score, 4);
}

#[test]
fn incomplete_frames_are_skipped_by_every_item() {
    let empty = LandmarkFrame::new(700, vec![]);
    for item in TestItem::ALL {
        if item.analyzer_kind() == AnalyzerKind::Timed {
            continue;
        }
        let mut assessment = Assessment::default();
        assessment.start(item).unwrap();
        assert!(assessment.process(&empty).unwrap().is_none(), "{item}");
        let report = assessment.finish().unwrap();
        assert_eq!(report.metadata.frames_processed, 0, "{item}");
    }
}

#[test]
fn completed_items_return_a_frozen_snapshot() {
    for item in TestItem::ALL {
        if item.analyzer_kind() == AnalyzerKind::Timed {
            continue;
        }
        let mut assessment = Assessment::default();
        assessment.start(item).unwrap();
        feed(&mut assessment, &PoseBuilder::standing_front(), 0, 100, 10);
        assessment.mark_complete().unwrap();

        let first = assessment
            .process(&PoseBuilder::standing_front().build(2000))
            .unwrap()
            .unwrap();
        let mut moved = PoseBuilder::standing_front();
        moved.shift_x(0.1).lift_foot(Side::Right, 0.05);
        let second = assessment.process(&moved.build(2100)).unwrap().unwrap();

        assert!(first.complete, "{item}");
        assert_eq!(first, second, "{item}");
    }
}

#[test]
fn lost_balance_is_sticky_once_complete() {
    let mut assessment = Assessment::default();
    assessment.start(TestItem::AlternatingStep).unwrap();
    feed(&mut assessment, &PoseBuilder::standing_front(), 0, 100, 10);
    assessment.set_lost_balance(true).unwrap();
    assessment.set_lost_balance(false).unwrap();

    let report = assessment.finish().unwrap();
    assert_eq!(report.score, 0);
    assert_eq!(report.metadata.completion, Some(CompletionKind::LostBalance));
}

#[test]
fn full_session_summary() {
    let mut assessment =
        Assessment::new(Calibrator::new(Some(170.0), 1.0), AnalyzerTuning::default());
    assessment.start(TestItem::SingleLegStance).unwrap();
    feed(&mut assessment, &PoseBuilder::standing_front(), 0, 100, 10);
    assert!(assessment.calibrator().is_calibrated());
    assessment.finish().unwrap();

    assessment.start(TestItem::StandingEyesClosed).unwrap();
    feed(&mut assessment, &PoseBuilder::standing_front(), 0, 100, 110);
    assert!(assessment.is_active_complete());
    assessment.finish().unwrap();

    assessment.record_timed(TestItem::TenMeterWalk, 8.0).unwrap();

    let summary = assessment.summary();
    assert_eq!(summary.items_scored, 2);
    assert_eq!(summary.total, 4);
    assert!(!summary.is_complete());
    assert_eq!(assessment.reports().len(), 3);
}
