use anyhow::{anyhow, Result};

use crate::detect::backend::Detector;
use crate::detect::result::Candidate;

/// Stub detector for demos and tests. Returns a fixed candidate list for every frame.
#[derive(Clone, Debug, Default)]
pub struct StubDetector {
    candidates: Vec<Candidate>,
}

impl StubDetector {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// Parse `class_id:score` pairs, e.g. `"17:0.92,1:0.61"`.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let mut candidates = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, score) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("stub candidate '{}' must be class_id:score", entry))?;
            let class_id: usize = id
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid class id in '{}'", entry))?;
            let score: f32 = score
                .trim()
                .parse()
                .map_err(|_| anyhow!("invalid score in '{}'", entry))?;
            if !(0.0..=1.0).contains(&score) {
                return Err(anyhow!("score in '{}' must be within 0..=1", entry));
            }
            candidates.push(Candidate::new(class_id, score));
        }
        Ok(Self { candidates })
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Candidate>> {
        if pixels.len() != (width as usize) * (height as usize) * 3 {
            return Err(anyhow!("stub detector expects rgb8 pixels"));
        }
        Ok(self.candidates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_candidate_spec() {
        let det = StubDetector::from_spec("17:0.92, 1:0.61").unwrap();
        assert_eq!(
            det.candidates,
            vec![Candidate::new(17, 0.92), Candidate::new(1, 0.61)]
        );
    }

    #[test]
    fn rejects_bad_spec() {
        assert!(StubDetector::from_spec("cat:0.9").is_err());
        assert!(StubDetector::from_spec("17").is_err());
        assert!(StubDetector::from_spec("17:1.5").is_err());
    }

    #[test]
    fn returns_candidates_for_every_frame() {
        let mut det = StubDetector::new(vec![Candidate::new(3, 0.7)]);
        let pixels = vec![0u8; 2 * 2 * 3];
        assert_eq!(det.detect(&pixels, 2, 2).unwrap().len(), 1);
        assert_eq!(det.detect(&pixels, 2, 2).unwrap().len(), 1);
        assert!(det.detect(&pixels, 3, 3).is_err());
    }
}
