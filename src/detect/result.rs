use serde::{Deserialize, Serialize};

/// One recognized object, in the shape the recognition service speaks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub name: String,
    /// Score in 0..=1.
    pub confidence: f64,
}

impl Detection {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Raw model output before thresholding and label lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub score: f32,
}

impl Candidate {
    pub fn new(class_id: usize, score: f32) -> Self {
        Self { class_id, score }
    }
}
