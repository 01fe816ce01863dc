use tokio::sync::mpsc;

use crate::core::model::{QualifiedImage, TabId};

/// Fire-and-forget messages for a listening UI surface.
#[derive(Debug, Clone)]
pub enum Event {
    /// Total candidate count queued for classification; sent once up front
    /// and again whenever a recursive expansion discovers more.
    LinkCount { total: usize },
    /// One completed top-level classification batch. `index` is the batch
    /// width, enabling progressive progress display.
    Batch {
        images: Vec<QualifiedImage>,
        index: usize,
    },
    /// Remaining download queue length.
    Progress { remaining: usize },
    /// Badge text for the owning tab; empty string clears it.
    Badge { tab: TabId, text: String },
    /// User-visible notification.
    Notice { message: String },
    /// The owning tab should close its progress UI.
    Close { tab: TabId },
}

/// Where the collector and download engine deliver their events. Delivery is
/// best-effort; a sink must never block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Bridges events onto an unbounded tokio channel. Dropped receivers are
/// ignored so a detached UI cannot stall the pipeline.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}
