use crate::actor::ActorClient;
use crate::api::event_bus::{ElectionEvent, EventListener};
use crate::chat::{ChatRequest, ChatResponse, ReplicatedSnapshot};
use crate::replica;
use crate::replica::{ActorExited, LeaderLookupError};

/// ReplicaHandle keeps a running replica alive. Dropping it (and its clones of the internal actor
/// client) shuts the replica and its gRPC server down.
pub struct ReplicaHandle {
    actor_client: ActorClient,
    pub event_listener: EventListener,
}

impl ReplicaHandle {
    pub(crate) fn new(actor_client: ActorClient, event_listener: EventListener) -> Self {
        ReplicaHandle {
            actor_client,
            event_listener,
        }
    }

    pub async fn is_leader(&self) -> Result<bool, ActorExited> {
        self.actor_client.is_leader().await
    }

    /// Replica ID of the leader this replica currently believes in.
    pub async fn current_leader_id(&self) -> Result<String, LeaderLookupError> {
        let stub = self.actor_client.current_leader_stub().await?;
        Ok(stub.replica_id().to_string())
    }

    /// A copy of the local application state. On followers this is the last snapshot received
    /// from the leader.
    pub async fn load_snapshot(&self) -> Result<ReplicatedSnapshot, ActorExited> {
        self.actor_client.load_snapshot().await
    }

    /// Runs a chat request against this replica without forwarding. Non-leaders answer with
    /// `SubmitRejected::NotLeader`.
    pub async fn submit_local(&self, request: ChatRequest) -> Result<ChatResponse, SubmitRejected> {
        self.actor_client.submit(request).await.map_err(SubmitRejected::from)
    }

    pub fn election_state(&self) -> ElectionEvent {
        self.event_listener.current()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitRejected {
    #[error("Not leader. Leader is {leader_replica_id}")]
    NotLeader { leader_replica_id: String },
    #[error("No leader is known")]
    NoLeader,
    #[error(transparent)]
    ActorExited(#[from] ActorExited),
}

// ------- Conversions --------

impl From<replica::SubmitError> for SubmitRejected {
    fn from(e: replica::SubmitError) -> Self {
        match e {
            replica::SubmitError::LeaderRedirect(leader) => SubmitRejected::NotLeader {
                leader_replica_id: leader.replica_id().to_string(),
            },
            replica::SubmitError::NoLeader => SubmitRejected::NoLeader,
            replica::SubmitError::ActorExited => SubmitRejected::ActorExited(ActorExited),
        }
    }
}
