use crate::actor::{ActorClient, ReplicaActor};
use crate::api::event_bus::EventListener;
use crate::api::handle::ReplicaHandle;
use crate::api::options::RaftOptionsValidated;
use crate::api::types::ReplicaMemberInfo;
use crate::chat::{ChatService, ChatStateMachine, PersistenceError, SnapshotFile};
use crate::replica::{MemberInfo, ReplicaId, ReplicaTimings};
use crate::server::RpcServer;
use crate::{replica, server, RaftOptions};
use std::convert::TryFrom;
use std::error::Error;

pub struct ReplicaConfig {
    pub my_replica_id: String,
    /// Replica everyone should initially follow. If it's us, we start campaigning right away.
    pub bootstrap_leader_id: Option<String>,
    pub cluster_members: Vec<ReplicaMemberInfo>,
    /// Where to persist the application snapshot. `None` keeps state in memory only.
    pub snapshot_file: Option<SnapshotFile>,
    pub info_logger: slog::Logger,
    pub options: RaftOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicaCreationError {
    #[error("Invalid cluster info")]
    InvalidClusterInfo(Box<dyn Error + Send + Sync>),
    #[error("Illegal options for configuring replica: {0}")]
    IllegalOptions(String),
    #[error("Failed to load snapshot")]
    SnapshotLoad(#[from] PersistenceError),
}

/// Starts a replica: loads any persisted snapshot, spawns the replica's event loop, and serves
/// both gRPC services on this member's port. Must be called from within a tokio runtime.
pub async fn try_create_replica(config: ReplicaConfig) -> Result<ReplicaHandle, ReplicaCreationError> {
    let root_logger = config.info_logger;

    let options = RaftOptionsValidated::try_from(config.options)
        .map_err(|e| ReplicaCreationError::IllegalOptions(e.to_string()))?;

    let initial_state = match &config.snapshot_file {
        Some(file) => {
            slog::info!(root_logger, "Loading snapshot from {:?}", file.path());
            file.load()?
        }
        None => Default::default(),
    };
    slog::info!(root_logger, "Starting with {} account(s)", initial_state.len());
    let application = ChatStateMachine::new(root_logger.clone(), initial_state, config.snapshot_file);

    let cluster_members: Vec<MemberInfo> = config.cluster_members.into_iter().map(MemberInfo::from).collect();

    let (actor_client, actor_queue_rx) = ActorClient::new(10);
    let (server_shutdown_handle, server_shutdown_signal) = server::shutdown_signal();

    let wired = replica::create_replica(
        root_logger.clone(),
        ReplicaId::new(config.my_replica_id),
        cluster_members,
        config.bootstrap_leader_id.map(ReplicaId::new),
        Box::new(application),
        server_shutdown_handle,
        actor_client.weak(),
        ReplicaTimings {
            leader_heartbeat_duration: options.leader_heartbeat_duration,
            follower_min_timeout: options.follower_min_timeout,
            follower_max_timeout: options.follower_max_timeout,
            rpc_timeout: options.peer_rpc_timeout,
        },
    )
    .map_err(|e| ReplicaCreationError::InvalidClusterInfo(e.into()))?;

    let replica_actor = ReplicaActor::new(root_logger.clone(), actor_queue_rx, wired.replica);
    tokio::spawn(replica_actor.run_event_loop());

    let chat_service = ChatService::new(
        root_logger.new(slog::o!("Service" => "Chat")),
        actor_client.weak(),
        options.client_forward_timeout,
    );
    let rpc_server = RpcServer::new(root_logger.clone(), actor_client.weak());
    tokio::spawn(rpc_server.run(wired.my_socket_addr, chat_service, server_shutdown_signal));

    if wired.campaign_immediately {
        slog::info!(root_logger, "Configured as bootstrap leader. Starting election now.");
        // Can only fail if the actor exited, which it can't have while we hold a strong handle.
        let _ = actor_client.follower_timeout().await;
    }

    Ok(ReplicaHandle::new(
        actor_client,
        EventListener::new(wired.election_state_change_listener),
    ))
}
