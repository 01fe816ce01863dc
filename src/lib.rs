pub mod collector;
pub mod core;
pub mod data;
pub mod downloader;
pub mod error;
pub mod events;
pub mod net;

// Re-export commonly used items for integration tests and external consumers
pub use crate::collector::Collector;
pub use crate::core::model::{Candidate, HeadMeta, QualifiedImage, SaveRequest, TabId};
pub use crate::downloader::{Engine, EngineConfig};
pub use crate::error::{FetchError, Rejection};
pub use crate::events::{ChannelSink, Event, EventSink};
pub use crate::net::{FsSaver, HttpNet, Net, Saver};
