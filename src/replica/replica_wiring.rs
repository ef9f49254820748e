use crate::actor::WeakActorClient;
use crate::replica::application::ApplicationAdapter;
use crate::replica::election::{ElectionConfig, ElectionState, ElectionStateChangeListener};
use crate::replica::local_state::VolatileLocalState;
use crate::replica::peers::{ClusterTracker, InvalidCluster, MemberInfo, ReplicaId};
use crate::replica::replica::Replica;
use crate::replica::replication::WholeSnapshotReplication;
use crate::replica::transport::GrpcTransport;
use crate::server;
use std::net::SocketAddr;
use std::time::Duration;

pub(crate) struct ReplicaTimings {
    pub leader_heartbeat_duration: Duration,
    pub follower_min_timeout: Duration,
    pub follower_max_timeout: Duration,
    pub rpc_timeout: Duration,
}

pub(crate) struct WiredReplica {
    pub replica: Replica,
    pub election_state_change_listener: ElectionStateChangeListener,
    pub my_socket_addr: SocketAddr,
    // The bootstrap leader is us, so campaign right away instead of waiting out a timeout.
    pub campaign_immediately: bool,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn create_replica(
    logger: slog::Logger,
    my_replica_id: ReplicaId,
    cluster_members: Vec<MemberInfo>,
    bootstrap_leader_id: Option<ReplicaId>,
    application: Box<dyn ApplicationAdapter>,
    server_shutdown_handle: server::RpcServerShutdownHandle,
    actor_client: WeakActorClient,
    timings: ReplicaTimings,
) -> Result<WiredReplica, InvalidCluster> {
    let cluster_tracker = ClusterTracker::create_valid_cluster(my_replica_id.clone(), cluster_members)?;

    let (known_leader, campaign_immediately) = match bootstrap_leader_id {
        None => (None, false),
        Some(leader_id) if leader_id == my_replica_id => (None, true),
        Some(leader_id) if cluster_tracker.contains_member(&leader_id) => (Some(leader_id), false),
        Some(leader_id) => return Err(InvalidCluster::UnknownBootstrapLeader(leader_id)),
    };

    let (election_state, election_state_change_listener) = ElectionState::new_follower(
        ElectionConfig {
            my_replica_id: my_replica_id.clone(),
            leader_heartbeat_duration: timings.leader_heartbeat_duration,
            follower_min_timeout: timings.follower_min_timeout,
            follower_max_timeout: timings.follower_max_timeout,
        },
        actor_client.clone(),
        known_leader,
    );

    let transport = GrpcTransport::new(
        logger.clone(),
        cluster_tracker.peer_handles(),
        actor_client,
        timings.rpc_timeout,
    );
    let my_socket_addr = cluster_tracker.my_socket_addr();

    let replica = Replica::new(
        logger.clone(),
        cluster_tracker,
        Box::new(VolatileLocalState::new(my_replica_id)),
        election_state,
        Box::new(WholeSnapshotReplication::new(logger)),
        application,
        Box::new(transport),
        server_shutdown_handle,
    );

    Ok(WiredReplica {
        replica,
        election_state_change_listener,
        my_socket_addr,
        campaign_immediately,
    })
}
