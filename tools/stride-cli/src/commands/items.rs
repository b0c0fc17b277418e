//! List the test catalogue.

use stride_pose_model::item::{AnalyzerKind, TestItem};

pub fn run() -> anyhow::Result<()> {
    println!("{:<4} {:<24} {:<36} {:<10} TARGET", "BBS", "SLUG", "ITEM", "ANALYZER");
    for item in TestItem::ALL {
        let number = item
            .bbs_number()
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let kind = match item.analyzer_kind() {
            AnalyzerKind::Dedicated => "dedicated",
            AnalyzerKind::Generic => "generic",
            AnalyzerKind::Timed => "timed",
        };
        let target = match (item.target_posture(), item.prescribed_duration_secs()) {
            (Some(posture), Some(secs)) => format!("{posture:?} {secs}s"),
            (None, Some(secs)) => format!("{secs}s"),
            _ => String::new(),
        };
        println!(
            "{number:<4} {:<24} {:<36} {kind:<10} {target}",
            item.slug(),
            item.label()
        );
    }
    Ok(())
}
