use crate::actor::WeakActorClient;
use crate::chat::state::{ChatRequest, ChatResponse};
use crate::grpc::grpc_chat_server::GrpcChat;
use crate::grpc::{
    AuthenticateRequest, DeleteRequest, DeliverRequest, EmptyResponse, ListRequest, SendRequest, StringResponse,
};
use crate::replica::{PeerHandle, SubmitError};
use std::time::Duration;
use tonic::metadata::MetadataValue;
use tonic::{Request, Response, Status};

// Set on requests one replica forwards to another. A forwarded request that lands on a non-leader
// fails instead of hopping again.
const FORWARDED_HEADER: &str = "x-replichat-forwarded";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ForwardError {
    #[error("No leader is known")]
    NoKnownLeader,
    #[error("Request was already forwarded once and landed on a non-leader")]
    AlreadyForwarded,
    #[error("Leader RPC failed: {0}")]
    Transport(Status),
    #[error("Timed out waiting for leader")]
    Timeout,
}

/// ChatService is the client facing gRPC interface. The leader serves requests from its own state;
/// everyone else relays the unmodified request to the leader and hands back whatever it says.
pub(crate) struct ChatService {
    logger: slog::Logger,
    local_replica: WeakActorClient,
    forward_timeout: Duration,
}

impl ChatService {
    pub(crate) fn new(logger: slog::Logger, local_replica: WeakActorClient, forward_timeout: Duration) -> Self {
        ChatService {
            logger,
            local_replica,
            forward_timeout,
        }
    }

    async fn handle<T>(&self, rpc_request: Request<T>, convert: fn(T) -> ChatRequest) -> Result<ChatResponse, Status>
    where
        T: std::fmt::Debug + Send,
    {
        let already_forwarded = rpc_request.metadata().get(FORWARDED_HEADER).is_some();
        let rpc_request = rpc_request.into_inner();
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);

        let request = convert(rpc_request);
        let failure = failure_response_for(&request);
        let result = match self.local_replica.submit(request.clone()).await {
            Ok(response) => Ok(response),
            Err(SubmitError::LeaderRedirect(leader)) => {
                if already_forwarded {
                    Err(ForwardError::AlreadyForwarded)
                } else {
                    self.forward(leader, request).await
                }
            }
            Err(SubmitError::NoLeader) => Err(ForwardError::NoKnownLeader),
            Err(SubmitError::ActorExited) => {
                return Err(Status::unavailable("Replica is shutting down"));
            }
        };

        let response = result.unwrap_or_else(|e| {
            slog::warn!(self.logger, "Failed to serve client request: {}", e);
            failure
        });
        slog::debug!(self.logger, "ServerWire - {:?}", response);

        Ok(response)
    }

    async fn forward(&self, leader: PeerHandle, request: ChatRequest) -> Result<ChatResponse, ForwardError> {
        slog::debug!(self.logger, "Forwarding to leader {}", leader.replica_id());
        tokio::time::timeout(self.forward_timeout, call_leader(leader, request))
            .await
            .map_err(|_| ForwardError::Timeout)?
    }
}

async fn call_leader(leader: PeerHandle, request: ChatRequest) -> Result<ChatResponse, ForwardError> {
    let mut client = leader.chat_client();

    let result = match request {
        ChatRequest::Authenticate { username, password } => client
            .authenticate(forwarded(AuthenticateRequest { username, password }))
            .await
            .map(|r| text_response(r.into_inner())),
        ChatRequest::List { token, pattern } => client
            .list(forwarded(ListRequest {
                token,
                request: pattern,
            }))
            .await
            .map(|r| text_response(r.into_inner())),
        ChatRequest::Send { token, recipient, body } => client
            .send(forwarded(SendRequest {
                token,
                username: recipient,
                body,
            }))
            .await
            .map(|r| ChatResponse::Empty {
                success: r.into_inner().success,
            }),
        ChatRequest::Deliver { token } => client
            .deliver(forwarded(DeliverRequest { token }))
            .await
            .map(|r| text_response(r.into_inner())),
        ChatRequest::Delete { token, username } => client
            .delete(forwarded(DeleteRequest { token, username }))
            .await
            .map(|r| ChatResponse::Empty {
                success: r.into_inner().success,
            }),
    };

    result.map_err(ForwardError::Transport)
}

fn forwarded<T>(message: T) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert(FORWARDED_HEADER, MetadataValue::from_static("1"));
    request
}

fn text_response(reply: StringResponse) -> ChatResponse {
    ChatResponse::Text {
        success: reply.success,
        response: reply.response,
    }
}

fn failure_response_for(request: &ChatRequest) -> ChatResponse {
    match request {
        ChatRequest::Authenticate { .. } | ChatRequest::List { .. } | ChatRequest::Deliver { .. } => {
            ChatResponse::Text {
                success: false,
                response: String::new(),
            }
        }
        ChatRequest::Send { .. } | ChatRequest::Delete { .. } => ChatResponse::Empty { success: false },
    }
}

fn into_string_response(response: ChatResponse) -> StringResponse {
    match response {
        ChatResponse::Text { success, response } => StringResponse { success, response },
        ChatResponse::Empty { success } => StringResponse {
            success,
            response: String::new(),
        },
    }
}

fn into_empty_response(response: ChatResponse) -> EmptyResponse {
    EmptyResponse {
        success: response.is_success(),
    }
}

#[async_trait::async_trait]
impl GrpcChat for ChatService {
    async fn authenticate(&self, request: Request<AuthenticateRequest>) -> Result<Response<StringResponse>, Status> {
        self.handle(request, |r| ChatRequest::Authenticate {
            username: r.username,
            password: r.password,
        })
        .await
        .map(|response| Response::new(into_string_response(response)))
    }

    async fn list(&self, request: Request<ListRequest>) -> Result<Response<StringResponse>, Status> {
        self.handle(request, |r| ChatRequest::List {
            token: r.token,
            pattern: r.request,
        })
        .await
        .map(|response| Response::new(into_string_response(response)))
    }

    async fn send(&self, request: Request<SendRequest>) -> Result<Response<EmptyResponse>, Status> {
        self.handle(request, |r| ChatRequest::Send {
            token: r.token,
            recipient: r.username,
            body: r.body,
        })
        .await
        .map(|response| Response::new(into_empty_response(response)))
    }

    async fn deliver(&self, request: Request<DeliverRequest>) -> Result<Response<StringResponse>, Status> {
        self.handle(request, |r| ChatRequest::Deliver { token: r.token })
            .await
            .map(|response| Response::new(into_string_response(response)))
    }

    async fn delete(&self, request: Request<DeleteRequest>) -> Result<Response<EmptyResponse>, Status> {
        self.handle(request, |r| ChatRequest::Delete {
            token: r.token,
            username: r.username,
        })
        .await
        .map(|response| Response::new(into_empty_response(response)))
    }
}
