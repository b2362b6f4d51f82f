//! Notifications produced by the engine for cache-invalidation and UI layers.
//!
//! Events are emitted after the corresponding write has been committed. Delivery is
//! through an injected [`EventSink`]; [`ChannelSink`] forwards into an `mpsc` channel
//! so listeners can consume events on their own thread.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;
use tracing::debug;

use crate::sync::SyncCounts;

/// Which synchronizer completed a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncScope {
    /// Product batch.
    Products,
    /// Category tree.
    Categories,
    /// Attribute option dictionary.
    AttributeOptions,
}

/// A committed change other layers may react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CatalogEvent {
    /// A stock record was written.
    StockChanged {
        /// SKU whose stock changed.
        sku: String,
        /// Orderability flipped (flag flip, or quantity crossed zero while in stock).
        status_changed: bool,
        /// In stock but below the configured low-stock threshold.
        low_stock: bool,
    },
    /// A synchronization run finished.
    SyncCompleted {
        /// Which synchronizer ran.
        scope: SyncScope,
        /// Per-outcome counters.
        counts: SyncCounts,
        /// Natural keys created, updated or deleted by the run.
        affected: Vec<String>,
    },
}

/// Receiver of [`CatalogEvent`]s.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block for long; the caller may hold a lock.
    fn emit(&self, event: CatalogEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, event: CatalogEvent) {
        debug!(?event, "event dropped (no sink)");
    }
}

/// Forwards events into an `mpsc` channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<CatalogEvent>,
}

impl ChannelSink {
    /// Create a sink together with the receiving end.
    pub fn channel() -> (Self, Receiver<CatalogEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CatalogEvent) {
        // A dropped receiver just means nobody is listening any more.
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_delivers_in_order() {
        let (sink, rx) = ChannelSink::channel();
        sink.emit(CatalogEvent::StockChanged {
            sku: "A".into(),
            status_changed: true,
            low_stock: false,
        });
        sink.emit(CatalogEvent::StockChanged {
            sku: "B".into(),
            status_changed: false,
            low_stock: true,
        });
        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(got.len(), 2);
        assert!(matches!(&got[0], CatalogEvent::StockChanged { sku, .. } if sku == "A"));
    }

    #[test]
    fn closed_channel_is_not_an_error() {
        let (sink, rx) = ChannelSink::channel();
        drop(rx);
        sink.emit(CatalogEvent::StockChanged {
            sku: "A".into(),
            status_changed: false,
            low_stock: false,
        });
    }
}
