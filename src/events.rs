//! Index maintainer signalling
//!
//! Writes to a partition must be followed by a signal so the (external)
//! index maintainer can recompute the aggregates that depend on it. The
//! default maintainer hook is an [`EventBus`] broadcasting [`IndexEvent`]s.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::Result;
use crate::partition::Partition;
use crate::types::Identity;

/// Events about partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// A partition's contents changed; dependent indexes are stale
    PartitionChanged { identity: Identity },
    /// A partition is no longer reachable and should be evicted
    PartitionDropped { identity: Identity },
}

/// Receives change notifications for partitions
#[async_trait]
pub trait IndexMaintainer: Send + Sync {
    async fn on_partition_change(&self, partition: &Partition) -> Result<()>;
}

/// Event bus for broadcasting partition events
pub struct EventBus {
    sender: broadcast::Sender<IndexEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new event bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: IndexEvent) {
        trace!(event = ?event, "Emitting index event");
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexMaintainer for EventBus {
    async fn on_partition_change(&self, partition: &Partition) -> Result<()> {
        self.emit(IndexEvent::PartitionChanged {
            identity: partition.identity().clone(),
        });
        Ok(())
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(IndexEvent::PartitionChanged { identity }) => {
                    debug!(identity = %identity, "Partition changed");
                }
                Ok(IndexEvent::PartitionDropped { identity }) => {
                    debug!(identity = %identity, "Partition dropped");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
