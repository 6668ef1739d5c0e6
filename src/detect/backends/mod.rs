pub mod stub;

pub use stub::StubDetector;
