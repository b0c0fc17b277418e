//! Stride Assessment Core: the scoring engine
//!
//! Turns a stream of pose landmark frames into Berg Balance Scale scores:
//! - **Calibration:** Map normalized distances to centimeters from patient height
//! - **Posture:** Classify sitting and standing, with temporal smoothing
//! - **Items:** One analyzer per BBS item, plus a duration-only fallback
//! - **Timed tests:** TUG and 10-meter walk risk bands
//!
//! This crate is pure computation: no I/O, no platform dependencies.
//! All inputs are data; all outputs are data.

pub mod analyzer;
pub mod body;
pub mod calibration;
pub mod config;
pub mod feet;
pub mod gate;
pub mod items;
pub mod posture;
pub mod scoring;
pub mod session;
pub mod timed;

pub use analyzer::{boxed, FrameLedger, FrameUpdate, ItemAnalyzer, ItemSession};
pub use calibration::{CalibrationProfile, Calibrator};
pub use config::AnalyzerTuning;
pub use posture::{Posture, PostureSmoother};
pub use session::{analyzer_for, Assessment, AssessmentError};
