mod application;
mod election;
mod local_state;
mod peer_client;
mod peers;
mod replica;
mod replica_api;
mod replica_wiring;
mod replication;
mod transport;

pub(crate) use application::ApplicationAdapter;
pub(crate) use election::ElectionStateChangeListener;
pub(crate) use election::ElectionStateSnapshot;
pub(crate) use local_state::Term;
pub use peer_client::PeerHandle;
pub(crate) use peers::InvalidCluster;
pub(crate) use peers::MemberInfo;
pub(crate) use peers::ReplicaId;
pub(crate) use replica::Replica;
pub use replica_api::ActorExited;
pub(crate) use replica_api::HeartbeatError;
pub(crate) use replica_api::HeartbeatInput;
pub(crate) use replica_api::HeartbeatOutput;
pub(crate) use replica_api::HeartbeatReplyFromPeer;
pub use replica_api::LeaderLookupError;
pub(crate) use replica_api::LeaderTimerTick;
pub use replica_api::NoKnownLeader;
pub(crate) use replica_api::RequestVoteError;
pub(crate) use replica_api::RequestVoteInput;
pub(crate) use replica_api::RequestVoteOutput;
pub(crate) use replica_api::RequestVoteReplyFromPeer;
pub(crate) use replica_api::SubmitError;
pub(crate) use replica_api::TermOutOfDateInfo;
pub(crate) use replica_wiring::create_replica;
pub(crate) use replica_wiring::ReplicaTimings;
