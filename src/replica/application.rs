use crate::chat::{ChatRequest, ChatResponse, ReplicatedSnapshot};

/// ApplicationAdapter is the seam between consensus and the application. The replica calls
/// outward through it and never looks inside the snapshot.
///
/// All three methods are called from the replica actor, one at a time, so implementations don't
/// need their own locking.
pub(crate) trait ApplicationAdapter: Send {
    /// Return the authoritative current state. Must be side-effect free.
    fn load_snapshot(&self) -> ReplicatedSnapshot;

    /// Atomically replace local state with `snapshot` accepted from a leader, and trigger a save.
    fn on_snapshot_received(&mut self, snapshot: ReplicatedSnapshot);

    /// Serve a client request. Only called while this replica is leader.
    fn apply(&mut self, request: ChatRequest) -> ChatResponse;
}
