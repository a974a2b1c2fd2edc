//! Audio decode and output layer

pub mod output;
pub mod source;
pub mod types;
pub mod vorbis;

pub use source::{PcmSource, SourceFactory};
pub use types::{AudioFrame, StreamSpec};
pub use vorbis::VorbisStream;
