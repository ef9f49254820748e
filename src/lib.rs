mod actor;
mod api;
mod chat;
mod replica;
mod server;
mod grpc {
    include!("../generated/replichat.rs");
}

pub use api::try_create_replica;
pub use api::ElectionEvent;
pub use api::EventListener;
pub use api::RaftOptions;
pub use api::ReplicaConfig;
pub use api::ReplicaCreationError;
pub use api::ReplicaHandle;
pub use api::ReplicaMemberInfo;
pub use api::SubmitRejected;
pub use chat::ChatRequest;
pub use chat::ChatResponse;
pub use chat::PersistenceError;
pub use chat::ReplicatedSnapshot;
pub use chat::SnapshotDecodeError;
pub use chat::SnapshotFile;
pub use replica::ActorExited;
pub use replica::LeaderLookupError;
pub use replica::NoKnownLeader;

// Client side of the chat service, for anything that wants to talk to a running cluster.
pub use grpc::grpc_chat_client::GrpcChatClient;
pub use grpc::{
    AuthenticateRequest, DeleteRequest, DeliverRequest, EmptyResponse, ListRequest, SendRequest, StringResponse,
};

// Learning 1: `create::{root_mod}` should not have any code. Just `mod` and `pub use` statements.
// Learning 2: All `mod` statements, anywhere, should not be `pub`. Only export `pub` via individual
//             use statements.
