use anyhow::Result;

use crate::detect::result::Candidate;

/// Object detector seam.
///
/// The model behind this trait is opaque: it receives decoded RGB8 pixels and
/// returns scored class ids in its own order. Thresholding, top-k and label
/// lookup happen in [`crate::detect::select_objects`], not here.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one decoded frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Candidate>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
