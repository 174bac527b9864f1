pub mod containers;
pub mod envelope;
pub mod images;
pub mod progress;
pub mod version;

pub use envelope::ApiEnvelope;
