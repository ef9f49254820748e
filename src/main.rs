use clap::Parser;
use replichat::{RaftOptions, ReplicaConfig, ReplicaMemberInfo, SnapshotFile};
use slog::Drain;
use std::error::Error;
use std::fs::OpenOptions;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Boots one replica of a replicated chat cluster.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Opt {
    /// This replica's ID. Must match one of the `--member` entries.
    #[arg(long)]
    id: String,

    /// Cluster member as `id=ip:port`. Repeat once per replica, including this one.
    #[arg(long = "member", required = true)]
    members: Vec<MemberArg>,

    /// Replica that everyone initially follows.
    #[arg(long)]
    leader: Option<String>,

    /// File to persist the chat state to. State is in-memory only if omitted.
    #[arg(long)]
    snapshot_file: Option<PathBuf>,

    /// Write logs to a timestamped file in this directory instead of stdout.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long)]
    heartbeat_ms: Option<u64>,

    #[arg(long)]
    election_min_ms: Option<u64>,

    #[arg(long)]
    election_max_ms: Option<u64>,

    #[arg(long)]
    rpc_timeout_ms: Option<u64>,

    #[arg(long)]
    forward_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug)]
struct MemberArg(ReplicaMemberInfo);

impl FromStr for MemberArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (replica_id, addr) = s
            .split_once('=')
            .ok_or_else(|| format!("expected id=ip:port, got '{}'", s))?;
        let (ip, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| format!("expected ip:port, got '{}'", addr))?;

        Ok(MemberArg(ReplicaMemberInfo {
            replica_id: replica_id.to_string(),
            ip_addr: ip.parse::<Ipv4Addr>().map_err(|e| e.to_string())?,
            port: port.parse::<u16>().map_err(|e| e.to_string())?,
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let opt = Opt::parse();

    let logger = match &opt.log_dir {
        Some(dir) => create_root_logger_for_file(dir, &opt.id)?,
        None => create_root_logger_for_stdout(&opt.id),
    };

    let config = ReplicaConfig {
        my_replica_id: opt.id.clone(),
        bootstrap_leader_id: opt.leader.clone(),
        cluster_members: opt.members.iter().map(|m| m.0.clone()).collect(),
        snapshot_file: opt.snapshot_file.clone().map(SnapshotFile::new),
        info_logger: logger.clone(),
        options: RaftOptions {
            leader_heartbeat_duration: opt.heartbeat_ms.map(Duration::from_millis),
            follower_min_timeout: opt.election_min_ms.map(Duration::from_millis),
            follower_max_timeout: opt.election_max_ms.map(Duration::from_millis),
            peer_rpc_timeout: opt.rpc_timeout_ms.map(Duration::from_millis),
            client_forward_timeout: opt.forward_timeout_ms.map(Duration::from_millis),
        },
    };

    let handle = replichat::try_create_replica(config).await?;
    slog::info!(logger, "Replica started in state {:?}", handle.election_state());

    tokio::signal::ctrl_c().await?;
    slog::info!(logger, "Interrupted. Shutting down.");
    drop(handle);

    Ok(())
}

fn create_root_logger_for_stdout(replica_id: &str) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!("ReplicaId" => replica_id.to_string()))
}

fn create_root_logger_for_file(log_dir: &Path, replica_id: &str) -> Result<slog::Logger, Box<dyn Error>> {
    std::fs::create_dir_all(log_dir)?;
    let log_file_name = format!(
        "replichat-{}-{}.log",
        replica_id,
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(log_file_name))?;

    let decorator = slog_term::PlainDecorator::new(file);
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Ok(slog::Logger::root(drain, slog::o!("ReplicaId" => replica_id.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_member_arg() {
        let member = MemberArg::from_str("a=127.0.0.1:4000").unwrap().0;
        assert_eq!(member.replica_id, "a");
        assert_eq!(member.ip_addr, Ipv4Addr::LOCALHOST);
        assert_eq!(member.port, 4000);
    }

    #[test]
    fn rejects_malformed_member_arg() {
        assert!(MemberArg::from_str("127.0.0.1:4000").is_err());
        assert!(MemberArg::from_str("a=127.0.0.1").is_err());
        assert!(MemberArg::from_str("a=localhost:4000").is_err());
    }
}
