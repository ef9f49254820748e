use crate::actor::WeakActorClient;
use crate::chat::{ChatService, ReplicatedSnapshot};
use crate::grpc::grpc_chat_server::GrpcChatServer;
use crate::grpc::grpc_raft_server::{GrpcRaft, GrpcRaftServer};
use crate::grpc::{ProtoHeartbeatReply, ProtoHeartbeatReq, ProtoRequestVoteReply, ProtoRequestVoteReq};
use crate::replica::{
    HeartbeatError, HeartbeatInput, HeartbeatOutput, ReplicaId, RequestVoteError, RequestVoteInput,
    RequestVoteOutput, Term,
};
use crate::server::RpcServerShutdownSignal;
use std::convert::TryFrom;
use std::net::SocketAddr;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// RpcServer is the type that implements the Raft gRPC interface. It shares its listening port
/// with the client facing chat service.
pub(crate) struct RpcServer {
    logger: slog::Logger,
    local_replica: WeakActorClient,
}

impl RpcServer {
    pub(crate) fn new(logger: slog::Logger, local_replica: WeakActorClient) -> Self {
        RpcServer { logger, local_replica }
    }

    pub(crate) async fn run(
        self,
        socket_addr: SocketAddr,
        chat_service: ChatService,
        shutdown_signal: RpcServerShutdownSignal,
    ) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", socket_addr);

        let result = Server::builder()
            .add_service(GrpcRaftServer::new(self))
            .add_service(GrpcChatServer::new(chat_service))
            .serve_with_shutdown(socket_addr, shutdown_signal.wait())
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    async fn handle_request_vote(&self, rpc_request: ProtoRequestVoteReq) -> Result<ProtoRequestVoteReply, Status> {
        let app_input = Self::convert_request_vote_input(rpc_request);
        let app_result = self.local_replica.request_vote(app_input).await;
        Self::convert_request_vote_result(app_result)
    }

    fn convert_request_vote_input(rpc_request: ProtoRequestVoteReq) -> RequestVoteInput {
        RequestVoteInput {
            candidate_term: Term::new(rpc_request.term),
            candidate_id: ReplicaId::new(rpc_request.client_node_id),
        }
    }

    fn convert_request_vote_result(
        app_result: Result<RequestVoteOutput, RequestVoteError>,
    ) -> Result<ProtoRequestVoteReply, Status> {
        match app_result {
            Ok(output) => Ok(ProtoRequestVoteReply {
                term: output.term.as_u64(),
                vote_granted: true,
            }),
            Err(RequestVoteError::VoteAlreadyCast { current_term, .. }) => Ok(ProtoRequestVoteReply {
                term: current_term.as_u64(),
                vote_granted: false,
            }),
            Err(RequestVoteError::StaleTerm(term_info)) => Ok(ProtoRequestVoteReply {
                term: term_info.current_term.as_u64(),
                vote_granted: false,
            }),
            Err(RequestVoteError::CandidateNotInCluster) => {
                Err(Status::failed_precondition("Candidate is not a member of this cluster"))
            }
            Err(RequestVoteError::ActorExited) => Err(Status::unavailable("Server internal replica task has exited")),
        }
    }

    async fn handle_heartbeat(&self, rpc_request: ProtoHeartbeatReq) -> Result<ProtoHeartbeatReply, Status> {
        let app_input = Self::convert_heartbeat_input(rpc_request)?;
        let app_result = self.local_replica.heartbeat(app_input).await;
        Self::convert_heartbeat_result(app_result)
    }

    fn convert_heartbeat_input(rpc_request: ProtoHeartbeatReq) -> Result<HeartbeatInput, Status> {
        // An absent snapshot is how proto3 encodes an empty one.
        let snapshot = match rpc_request.snapshot {
            Some(proto) => ReplicatedSnapshot::try_from(proto)
                .map_err(|e| Status::invalid_argument(format!("Malformed snapshot: {}", e)))?,
            None => ReplicatedSnapshot::default(),
        };

        Ok(HeartbeatInput {
            leader_term: Term::new(rpc_request.term),
            leader_id: ReplicaId::new(rpc_request.client_node_id),
            snapshot,
        })
    }

    fn convert_heartbeat_result(
        app_result: Result<HeartbeatOutput, HeartbeatError>,
    ) -> Result<ProtoHeartbeatReply, Status> {
        match app_result {
            Ok(output) => Ok(ProtoHeartbeatReply {
                term: output.term.as_u64(),
                accepted: true,
            }),
            Err(HeartbeatError::StaleTerm(term_info)) => Ok(ProtoHeartbeatReply {
                term: term_info.current_term.as_u64(),
                accepted: false,
            }),
            Err(HeartbeatError::LeaderNotInCluster) => {
                Err(Status::failed_precondition("Leader is not a member of this cluster"))
            }
            Err(HeartbeatError::ActorExited) => Err(Status::unavailable("Server internal replica task has exited")),
        }
    }
}

#[async_trait::async_trait]
impl GrpcRaft for RpcServer {
    async fn request_vote(
        &self,
        rpc_request_wrapped: Request<ProtoRequestVoteReq>,
    ) -> Result<Response<ProtoRequestVoteReply>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_request_vote(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn heartbeat(
        &self,
        rpc_request_wrapped: Request<ProtoHeartbeatReq>,
    ) -> Result<Response<ProtoHeartbeatReply>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        // Snapshots can be large; log the envelope only.
        slog::debug!(
            self.logger,
            "ServerWire - ProtoHeartbeatReq {{ client_node_id: {:?}, term: {} }}",
            rpc_request.client_node_id,
            rpc_request.term
        );
        let rpc_result = self.handle_heartbeat(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::{ProtoMailbox, ProtoSnapshot};
    use crate::replica::TermOutOfDateInfo;
    use tonic::Code;

    #[test]
    fn vote_results_map_to_replies() {
        let granted = RpcServer::convert_request_vote_result(Ok(RequestVoteOutput { term: Term::new(4) })).unwrap();
        assert_eq!(
            granted,
            ProtoRequestVoteReply {
                term: 4,
                vote_granted: true
            }
        );

        let stale = RpcServer::convert_request_vote_result(Err(RequestVoteError::StaleTerm(TermOutOfDateInfo {
            current_term: Term::new(7),
        })))
        .unwrap();
        assert_eq!(
            stale,
            ProtoRequestVoteReply {
                term: 7,
                vote_granted: false
            }
        );

        let taken = RpcServer::convert_request_vote_result(Err(RequestVoteError::VoteAlreadyCast {
            current_term: Term::new(5),
            voted_for: ReplicaId::new("other"),
        }))
        .unwrap();
        assert_eq!(
            taken,
            ProtoRequestVoteReply {
                term: 5,
                vote_granted: false
            }
        );

        let stranger = RpcServer::convert_request_vote_result(Err(RequestVoteError::CandidateNotInCluster));
        assert_eq!(stranger.unwrap_err().code(), Code::FailedPrecondition);

        let dead = RpcServer::convert_request_vote_result(Err(RequestVoteError::ActorExited));
        assert_eq!(dead.unwrap_err().code(), Code::Unavailable);
    }

    #[test]
    fn heartbeat_without_snapshot_carries_empty_state() {
        let input = RpcServer::convert_heartbeat_input(ProtoHeartbeatReq {
            client_node_id: "leader".to_string(),
            term: 3,
            snapshot: None,
        })
        .unwrap();

        assert_eq!(input.leader_id, ReplicaId::new("leader"));
        assert_eq!(input.leader_term, Term::new(3));
        assert!(input.snapshot.is_empty());
    }

    #[test]
    fn heartbeat_with_inconsistent_snapshot_is_invalid() {
        let mut snapshot = ProtoSnapshot::default();
        snapshot
            .passwords
            .insert("alice".to_string(), "pw".to_string());
        snapshot
            .messages
            .insert("alice".to_string(), ProtoMailbox::default());
        // No token entry for alice.

        let result = RpcServer::convert_heartbeat_input(ProtoHeartbeatReq {
            client_node_id: "leader".to_string(),
            term: 3,
            snapshot: Some(snapshot),
        });

        assert_eq!(result.unwrap_err().code(), Code::InvalidArgument);
    }

    #[test]
    fn stale_heartbeat_is_rejected_with_current_term() {
        let reply = RpcServer::convert_heartbeat_result(Err(HeartbeatError::StaleTerm(TermOutOfDateInfo {
            current_term: Term::new(9),
        })))
        .unwrap();

        assert_eq!(
            reply,
            ProtoHeartbeatReply {
                term: 9,
                accepted: false
            }
        );
    }
}
