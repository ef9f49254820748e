use crate::replica::peer_client::{ConnectError, PeerHandle};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// ReplicaId is the stable identity of a cluster member.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) struct ReplicaId(String);

impl ReplicaId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        ReplicaId(id.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct MemberInfo {
    replica_id: ReplicaId,
    ip_addr: Ipv4Addr,
    port: u16,
}

impl MemberInfo {
    pub(crate) fn new(replica_id: ReplicaId, ip_addr: Ipv4Addr, port: u16) -> Self {
        MemberInfo {
            replica_id,
            ip_addr,
            port,
        }
    }

    pub(crate) fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    pub(crate) fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.ip_addr, self.port))
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum InvalidCluster {
    #[error("my replica ID {0:?} is not in cluster config")]
    MeNotInCluster(ReplicaId),
    #[error("replica ID {0:?} appears more than once in cluster config")]
    DuplicateMember(ReplicaId),
    #[error("bootstrap leader {0:?} is not in cluster config")]
    UnknownBootstrapLeader(ReplicaId),
    #[error("can't create transport to peer {0:?}: {1}")]
    PeerConnect(ReplicaId, ConnectError),
}

/// ClusterTracker holds the fixed cluster membership, and a transport handle for each peer.
pub(crate) struct ClusterTracker {
    me: MemberInfo,
    peers: HashMap<ReplicaId, PeerHandle>,
}

impl ClusterTracker {
    /// Membership is fixed for the life of the process, so all validation happens here.
    pub(crate) fn create_valid_cluster(
        my_replica_id: ReplicaId,
        cluster_members: Vec<MemberInfo>,
    ) -> Result<Self, InvalidCluster> {
        let mut seen = HashSet::with_capacity(cluster_members.len());
        let mut me = None;
        let mut peers = HashMap::with_capacity(cluster_members.len().saturating_sub(1));

        for member in cluster_members {
            if !seen.insert(member.replica_id().clone()) {
                return Err(InvalidCluster::DuplicateMember(member.replica_id().clone()));
            }

            if member.replica_id() == &my_replica_id {
                me = Some(member);
                continue;
            }

            let handle = PeerHandle::connect_lazy(&member)
                .map_err(|e| InvalidCluster::PeerConnect(member.replica_id().clone(), e))?;
            peers.insert(member.replica_id().clone(), handle);
        }

        let me = me.ok_or_else(|| InvalidCluster::MeNotInCluster(my_replica_id))?;

        Ok(ClusterTracker { me, peers })
    }

    pub(crate) fn my_replica_id(&self) -> &ReplicaId {
        self.me.replica_id()
    }

    pub(crate) fn my_socket_addr(&self) -> SocketAddr {
        self.me.socket_addr()
    }

    pub(crate) fn contains_member(&self, replica_id: &ReplicaId) -> bool {
        self.my_replica_id() == replica_id || self.peers.contains_key(replica_id)
    }

    /// Every member votes, including me.
    pub(crate) fn num_voting_replicas(&self) -> usize {
        self.peers.len() + 1
    }

    pub(crate) fn peer(&self, peer_id: &ReplicaId) -> Option<&PeerHandle> {
        self.peers.get(peer_id)
    }

    pub(crate) fn peer_ids(&self) -> Vec<ReplicaId> {
        let mut ids: Vec<ReplicaId> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub(crate) fn peer_handles(&self) -> HashMap<ReplicaId, PeerHandle> {
        self.peers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, port: u16) -> MemberInfo {
        MemberInfo::new(ReplicaId::new(id), Ipv4Addr::LOCALHOST, port)
    }

    #[tokio::test]
    async fn valid_cluster() {
        let tracker = ClusterTracker::create_valid_cluster(
            ReplicaId::new("b"),
            vec![member("a", 1), member("b", 2), member("c", 3)],
        )
        .unwrap();

        assert_eq!(tracker.num_voting_replicas(), 3);
        assert_eq!(tracker.peer_ids(), vec![ReplicaId::new("a"), ReplicaId::new("c")]);
        assert!(tracker.contains_member(&ReplicaId::new("b")));
        assert!(!tracker.contains_member(&ReplicaId::new("z")));
        assert!(tracker.peer(&ReplicaId::new("b")).is_none());
        assert_eq!(tracker.my_socket_addr().port(), 2);
    }

    #[tokio::test]
    async fn me_missing_from_cluster() {
        let result = ClusterTracker::create_valid_cluster(ReplicaId::new("z"), vec![member("a", 1)]);
        assert!(matches!(result, Err(InvalidCluster::MeNotInCluster(_))));
    }

    #[tokio::test]
    async fn duplicate_member() {
        let result =
            ClusterTracker::create_valid_cluster(ReplicaId::new("a"), vec![member("a", 1), member("a", 2)]);
        assert!(matches!(result, Err(InvalidCluster::DuplicateMember(_))));
    }
}
