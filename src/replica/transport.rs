use crate::actor::WeakActorClient;
use crate::grpc::grpc_raft_client::GrpcRaftClient;
use crate::grpc::{ProtoHeartbeatReq, ProtoRequestVoteReq, ProtoSnapshot};
use crate::replica::local_state::Term;
use crate::replica::peer_client::PeerHandle;
use crate::replica::peers::ReplicaId;
use crate::replica::replica_api::{
    HeartbeatInput, HeartbeatReplyFromPeer, PeerAck, PeerVote, RequestVoteInput, RequestVoteReplyFromPeer,
    RpcReplyError,
};
use std::collections::HashMap;
use std::time::Duration;
use tonic::transport::Channel;

/// RaftTransport is the outbound half of the replica-to-replica protocol. Dispatch methods must
/// not block: the reply comes back to the replica later as an actor event.
pub(crate) trait RaftTransport: Send {
    fn dispatch_request_vote(&self, peer_id: &ReplicaId, request: RequestVoteInput);
    fn dispatch_heartbeat(&self, peer_id: &ReplicaId, request: HeartbeatInput);
}

/// GrpcTransport calls peers over gRPC on spawned tasks and feeds results back to the actor.
/// Every call is bounded by `rpc_timeout`, so a dead peer can't hold up an election round or a
/// heartbeat tick.
pub(crate) struct GrpcTransport {
    logger: slog::Logger,
    peers: HashMap<ReplicaId, PeerHandle>,
    actor_client: WeakActorClient,
    rpc_timeout: Duration,
}

impl GrpcTransport {
    pub(crate) fn new(
        logger: slog::Logger,
        peers: HashMap<ReplicaId, PeerHandle>,
        actor_client: WeakActorClient,
        rpc_timeout: Duration,
    ) -> Self {
        GrpcTransport {
            logger,
            peers,
            actor_client,
            rpc_timeout,
        }
    }

    fn peer_client(&self, peer_id: &ReplicaId) -> Option<GrpcRaftClient<Channel>> {
        let client = self.peers.get(peer_id).map(PeerHandle::raft_client);
        if client.is_none() {
            slog::error!(self.logger, "Peer {:?} not found in transport. Wtf!", peer_id);
        }
        client
    }

    fn peer_logger(&self, peer_id: &ReplicaId) -> slog::Logger {
        self.logger.new(slog::o!("Peer" => format!("{:?}", peer_id)))
    }
}

impl RaftTransport for GrpcTransport {
    fn dispatch_request_vote(&self, peer_id: &ReplicaId, request: RequestVoteInput) {
        if let Some(client) = self.peer_client(peer_id) {
            tokio::task::spawn(call_peer_request_vote(
                self.peer_logger(peer_id),
                client,
                peer_id.clone(),
                request,
                self.rpc_timeout,
                self.actor_client.clone(),
            ));
        }
    }

    fn dispatch_heartbeat(&self, peer_id: &ReplicaId, request: HeartbeatInput) {
        if let Some(client) = self.peer_client(peer_id) {
            tokio::task::spawn(call_peer_heartbeat(
                self.peer_logger(peer_id),
                client,
                peer_id.clone(),
                request,
                self.rpc_timeout,
                self.actor_client.clone(),
            ));
        }
    }
}

async fn call_peer_request_vote(
    logger: slog::Logger,
    mut peer_client: GrpcRaftClient<Channel>,
    peer_id: ReplicaId,
    request: RequestVoteInput,
    rpc_timeout: Duration,
    callback: WeakActorClient,
) {
    let term = request.candidate_term;
    let rpc_request = ProtoRequestVoteReq {
        client_node_id: request.candidate_id.into_inner(),
        term: term.as_u64(),
    };

    slog::debug!(logger, "ClientWire - {:?}", rpc_request);
    let rpc_reply = tokio::time::timeout(rpc_timeout, peer_client.request_vote(rpc_request)).await;
    slog::debug!(logger, "ClientWire - {:?}", rpc_reply);

    let result = match rpc_reply {
        Ok(Ok(response)) => {
            let reply = response.into_inner();
            Ok(PeerVote {
                term: Term::new(reply.term),
                vote_granted: reply.vote_granted,
            })
        }
        Ok(Err(status)) => Err(RpcReplyError::PeerUnreachable(format!("{:?}", status))),
        Err(_timeout) => Err(RpcReplyError::Timeout),
    };

    let reply = RequestVoteReplyFromPeer { peer_id, term, result };
    if callback.notify_request_vote_reply_from_peer(reply).await.is_err() {
        slog::debug!(logger, "Replica exited before RequestVote reply arrived");
    }
}

async fn call_peer_heartbeat(
    logger: slog::Logger,
    mut peer_client: GrpcRaftClient<Channel>,
    peer_id: ReplicaId,
    request: HeartbeatInput,
    rpc_timeout: Duration,
    callback: WeakActorClient,
) {
    let term = request.leader_term;
    let rpc_request = ProtoHeartbeatReq {
        client_node_id: request.leader_id.into_inner(),
        term: term.as_u64(),
        snapshot: Some(ProtoSnapshot::from(&request.snapshot)),
    };

    slog::debug!(logger, "ClientWire - Heartbeat(term={:?})", term);
    let rpc_reply = tokio::time::timeout(rpc_timeout, peer_client.heartbeat(rpc_request)).await;
    slog::debug!(logger, "ClientWire - {:?}", rpc_reply);

    let result = match rpc_reply {
        Ok(Ok(response)) => {
            let reply = response.into_inner();
            Ok(PeerAck {
                term: Term::new(reply.term),
                accepted: reply.accepted,
            })
        }
        Ok(Err(status)) => Err(RpcReplyError::PeerUnreachable(format!("{:?}", status))),
        Err(_timeout) => Err(RpcReplyError::Timeout),
    };

    let reply = HeartbeatReplyFromPeer { peer_id, term, result };
    if callback.notify_heartbeat_reply_from_peer(reply).await.is_err() {
        slog::debug!(logger, "Replica exited before Heartbeat reply arrived");
    }
}
