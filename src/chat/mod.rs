mod persistence;
mod service;
mod snapshot;
mod state;

pub(crate) use service::ChatService;
pub use persistence::PersistenceError;
pub use persistence::SnapshotFile;
pub use snapshot::ReplicatedSnapshot;
pub use snapshot::SnapshotDecodeError;
pub use state::ChatRequest;
pub use state::ChatResponse;
pub(crate) use state::ChatStateMachine;
