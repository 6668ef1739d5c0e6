//! Object detection for the local recognition service.
//!
//! The detector itself is an opaque seam (`Detector`). This module owns what
//! happens to its raw output before it goes on the wire: score threshold,
//! top-k limit and COCO label lookup.

mod backend;
mod backends;
mod labels;
mod result;

pub use backend::Detector;
pub use backends::StubDetector;
pub use labels::{label_for, COCO_CATEGORIES};
pub use result::{Candidate, Detection};

/// Default minimum score for a candidate to be reported.
pub const DEFAULT_THRESHOLD: f32 = 0.5;
/// Default cap on reported objects per frame.
pub const DEFAULT_MAX_OBJECTS: usize = 10;

/// Turn raw candidates into reportable detections.
///
/// Candidates below `threshold` are dropped in model order. When more than
/// `max_objects` remain, the highest-scoring ones are kept, best first.
/// Unknown ids and placeholder categories are skipped after the limit is applied,
/// so the result may hold fewer than `max_objects` entries.
pub fn select_objects(
    candidates: &[Candidate],
    threshold: f32,
    max_objects: usize,
) -> Vec<Detection> {
    let mut kept: Vec<Candidate> = candidates
        .iter()
        .copied()
        .filter(|c| c.score >= threshold)
        .collect();

    if kept.len() > max_objects {
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept.truncate(max_objects);
    }

    kept.into_iter()
        .filter_map(|c| {
            label_for(c.class_id).map(|name| Detection::new(name, f64::from(c.score)))
        })
        .collect()
}
