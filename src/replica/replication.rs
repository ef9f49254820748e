use crate::chat::ReplicatedSnapshot;
use crate::replica::application::ApplicationAdapter;

/// ReplicationStrategy decides what a leader sends to followers on each heartbeat, and what a
/// follower does with what it receives. Election logic only talks to this trait, so a log based
/// strategy can replace the whole-snapshot one without touching elections.
pub(crate) trait ReplicationStrategy: Send {
    fn outgoing(&mut self, application: &dyn ApplicationAdapter) -> ReplicatedSnapshot;
    fn incoming(&mut self, application: &mut dyn ApplicationAdapter, snapshot: ReplicatedSnapshot);
}

/// WholeSnapshotReplication ships the entire application state on every heartbeat, and followers
/// adopt it unconditionally. Every accepted heartbeat is a full resync.
///
/// Known gap: writes accepted by a deposed leader are silently discarded by the next heartbeat
/// from the rightful leader. Nothing beyond the term is compared.
pub(crate) struct WholeSnapshotReplication {
    logger: slog::Logger,
}

impl WholeSnapshotReplication {
    pub(crate) fn new(logger: slog::Logger) -> Self {
        WholeSnapshotReplication { logger }
    }
}

impl ReplicationStrategy for WholeSnapshotReplication {
    fn outgoing(&mut self, application: &dyn ApplicationAdapter) -> ReplicatedSnapshot {
        application.load_snapshot()
    }

    fn incoming(&mut self, application: &mut dyn ApplicationAdapter, snapshot: ReplicatedSnapshot) {
        slog::debug!(self.logger, "Adopting leader snapshot with {} accounts", snapshot.len());
        application.on_snapshot_received(snapshot);
    }
}
