use crate::grpc::grpc_chat_client::GrpcChatClient;
use crate::grpc::grpc_raft_client::GrpcRaftClient;
use crate::replica::peers::{MemberInfo, ReplicaId};
use tonic::codegen::http::uri;
use tonic::transport::{Channel, Endpoint};

/// PeerHandle is the transport stub for one peer replica. It can issue the inter-replica RPCs,
/// and re-issue any client RPC when this replica forwards to the leader.
///
/// Cloning is cheap; clones share the same underlying connection.
#[derive(Clone, Debug)]
pub struct PeerHandle {
    replica_id: ReplicaId,
    raft_client: GrpcRaftClient<Channel>,
    chat_client: GrpcChatClient<Channel>,
}

impl PeerHandle {
    /// The connection is established on first use, so a peer that is down at startup doesn't
    /// prevent this replica from starting.
    pub(crate) fn connect_lazy(member: &MemberInfo) -> Result<Self, ConnectError> {
        let url = format!("http://{}", member.socket_addr());
        let channel = Endpoint::from_shared(url)?.connect_lazy()?;

        Ok(PeerHandle {
            replica_id: member.replica_id().clone(),
            raft_client: GrpcRaftClient::new(channel.clone()),
            chat_client: GrpcChatClient::new(channel),
        })
    }

    pub fn replica_id(&self) -> &str {
        self.replica_id.as_str()
    }

    pub(crate) fn raft_client(&self) -> GrpcRaftClient<Channel> {
        self.raft_client.clone()
    }

    pub(crate) fn chat_client(&self) -> GrpcChatClient<Channel> {
        self.chat_client.clone()
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConnectError {
    #[error("invalid peer uri: {0}")]
    InvalidUri(#[from] uri::InvalidUri),
    #[error("transport failure: {0}")]
    Transport(#[from] tonic::transport::Error),
}
