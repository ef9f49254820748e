//! This mod is meant to hold most of the code for the library's client-facing API.
mod event_bus;
mod handle;
mod options;
mod types;
mod wiring;

pub use event_bus::ElectionEvent;
pub use event_bus::EventListener;
pub use handle::ReplicaHandle;
pub use handle::SubmitRejected;
pub use options::RaftOptions;
pub use types::ReplicaMemberInfo;
pub use wiring::try_create_replica;
pub use wiring::ReplicaConfig;
pub use wiring::ReplicaCreationError;
