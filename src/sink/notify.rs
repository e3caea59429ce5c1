use tokio::sync::mpsc::UnboundedSender;

/// New files were persisted by a flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub job_id: Option<i64>,
    /// Rows actually inserted (duplicates excluded)
    pub new_files: usize,
}

/// Downstream consumer of discovery events
///
/// Implementations must not block.
pub trait DiscoveryNotifier: Send + Sync {
    fn files_discovered(&self, event: DiscoveryEvent);
}

/// Notifier that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl DiscoveryNotifier for NoopNotifier {
    fn files_discovered(&self, _event: DiscoveryEvent) {}
}

/// Notifier that forwards events over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<DiscoveryEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<DiscoveryEvent>) -> Self {
        Self { tx }
    }
}

impl DiscoveryNotifier for ChannelNotifier {
    fn files_discovered(&self, event: DiscoveryEvent) {
        // A closed receiver is not the writer's problem
        if self.tx.send(event).is_err() {
            tracing::debug!("Discovery receiver dropped; event discarded");
        }
    }
}
