use replichat::{
    AuthenticateRequest, DeliverRequest, ElectionEvent, GrpcChatClient, ListRequest, SendRequest, SnapshotFile,
};
use slog::Drain;
use std::collections::HashMap;
use std::error::Error;
use std::net::Ipv4Addr;
use tokio::time::{Duration, Instant};

#[tokio::test]
async fn leader_election() -> Result<(), Box<dyn Error>> {
    let heartbeat_duration = Duration::from_millis(100);
    let num_members = 3;
    let mut replicas = HashMap::with_capacity(num_members);
    for i in 0..num_members {
        let replica_config = config(i, num_members, 5100, heartbeat_duration, None);
        let replica_id = replica_config.my_replica_id.clone();
        let replica = replichat::try_create_replica(replica_config).await?;
        replicas.insert(replica_id, replica);
    }

    let leader_id = wait_for_agreed_leader(&replicas, Duration::from_secs(10)).await;

    let mut num_leaders = 0;
    for (replica_id, replica) in replicas.iter() {
        if replica.is_leader().await? {
            assert_eq!(replica_id, &leader_id);
            num_leaders += 1;
        }
    }
    assert_eq!(num_leaders, 1);

    // Nothing has been written, so everyone holds the same empty state.
    for (_, replica) in replicas.iter() {
        assert!(replica.load_snapshot().await?.is_empty());
    }

    Ok(())
}

#[tokio::test]
async fn bootstrap_leader_wins_first_election() -> Result<(), Box<dyn Error>> {
    let heartbeat_duration = Duration::from_millis(100);
    let num_members = 3;
    let mut replicas = HashMap::with_capacity(num_members);
    for i in 0..num_members {
        let replica_config = config(i, num_members, 5200, heartbeat_duration, Some(repl_id(0)));
        let replica_id = replica_config.my_replica_id.clone();
        let replica = replichat::try_create_replica(replica_config).await?;
        replicas.insert(replica_id, replica);
    }

    let leader_id = wait_for_agreed_leader(&replicas, Duration::from_secs(10)).await;
    assert_eq!(leader_id, repl_id(0));

    Ok(())
}

#[tokio::test]
async fn follower_forwards_client_requests_to_leader() -> Result<(), Box<dyn Error>> {
    let heartbeat_duration = Duration::from_millis(100);
    let num_members = 3;
    let port_base = 5300;
    let snapshot_dir = tempfile::tempdir()?;
    let mut replicas = HashMap::with_capacity(num_members);
    for i in 0..num_members {
        let mut replica_config = config(i, num_members, port_base, heartbeat_duration, None);
        replica_config.snapshot_file = Some(SnapshotFile::new(
            snapshot_dir.path().join(format!("{}.snapshot", repl_id(i))),
        ));
        let replica_id = replica_config.my_replica_id.clone();
        let replica = replichat::try_create_replica(replica_config).await?;
        replicas.insert(replica_id, replica);
    }

    let leader_id = wait_for_agreed_leader(&replicas, Duration::from_secs(10)).await;
    let follower_index = (0..num_members)
        .find(|i| repl_id(*i) != leader_id)
        .expect("3 node cluster has a follower");

    let mut client = GrpcChatClient::connect(format!("http://127.0.0.1:{}", port_base + follower_index as u16)).await?;

    let alice = client
        .authenticate(AuthenticateRequest {
            username: "alice".to_string(),
            password: "pw-a".to_string(),
        })
        .await?
        .into_inner();
    assert!(alice.success, "Forwarded authenticate failed: {:?}", alice);

    let bob = client
        .authenticate(AuthenticateRequest {
            username: "bob".to_string(),
            password: "pw-b".to_string(),
        })
        .await?
        .into_inner();
    assert!(bob.success);

    let sent = client
        .send(SendRequest {
            token: alice.response.clone(),
            username: "bob".to_string(),
            body: "hello".to_string(),
        })
        .await?
        .into_inner();
    assert!(sent.success);

    let listed = client
        .list(ListRequest {
            token: alice.response.clone(),
            request: "^b".to_string(),
        })
        .await?
        .into_inner();
    assert!(listed.success);
    assert!(listed.response.contains("bob"));
    assert!(!listed.response.contains("alice"));

    // Let a few heartbeats carry the leader's state to everyone.
    sleep(heartbeat_duration * 5).await;
    let leader_snapshot = replicas[&leader_id].load_snapshot().await?;
    assert_eq!(leader_snapshot.len(), 2);
    for (_, replica) in replicas.iter() {
        assert_eq!(replica.load_snapshot().await?, leader_snapshot);
    }

    let delivered = client
        .deliver(DeliverRequest {
            token: bob.response.clone(),
        })
        .await?
        .into_inner();
    assert!(delivered.success);
    assert!(delivered.response.contains("hello"));

    Ok(())
}

fn config(
    id: usize,
    num_members: usize,
    port_base: u16,
    heartbeat_duration: Duration,
    bootstrap_leader_id: Option<String>,
) -> replichat::ReplicaConfig {
    assert!(id < num_members, "ID must be in the range [0, {}]", num_members - 1);

    let mut cluster_members = Vec::with_capacity(num_members);
    for i in 0..num_members {
        cluster_members.push(member_info(port_base, i));
    }

    let info_logger = create_root_logger_for_stdout(repl_id(id));

    replichat::ReplicaConfig {
        my_replica_id: repl_id(id),
        bootstrap_leader_id,
        cluster_members,
        snapshot_file: None,
        info_logger,
        options: replichat::RaftOptions {
            leader_heartbeat_duration: Some(heartbeat_duration),
            follower_min_timeout: Some(heartbeat_duration * 5),
            follower_max_timeout: Some(heartbeat_duration * 15),
            peer_rpc_timeout: Some(heartbeat_duration * 2),
            ..replichat::RaftOptions::default()
        },
    }
}

fn member_info(port_base: u16, id: usize) -> replichat::ReplicaMemberInfo {
    replichat::ReplicaMemberInfo {
        replica_id: repl_id(id),
        ip_addr: Ipv4Addr::from([127, 0, 0, 1]),
        port: port_base + id as u16,
    }
}

fn repl_id(id: usize) -> String {
    format!("replica-{}", id + 1)
}

/// Waits until one replica is leader and every other replica follows it.
async fn wait_for_agreed_leader(replicas: &HashMap<String, replichat::ReplicaHandle>, timeout: Duration) -> String {
    let deadline = Instant::now() + timeout;

    loop {
        assert!(Instant::now() < deadline, "Timeout waiting for leader election");

        let mut leaders = Vec::new();
        let mut followed = Vec::new();
        for (replica_id, replica) in replicas.iter() {
            match replica.election_state() {
                ElectionEvent::Leader => leaders.push(replica_id.clone()),
                ElectionEvent::Follower { leader_replica_id } => followed.push(leader_replica_id),
                ElectionEvent::Candidate | ElectionEvent::FollowerNoLeader => {}
            }
        }

        if leaders.len() == 1 && followed.len() == replicas.len() - 1 && followed.iter().all(|l| l == &leaders[0]) {
            return leaders.remove(0);
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn create_root_logger_for_stdout(replica_id: String) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("ReplicaId" => replica_id))
}

async fn sleep(duration: Duration) {
    println!("Sleep {}ms", duration.as_millis());
    tokio::time::sleep(duration).await;
    println!("Awake!");
}
