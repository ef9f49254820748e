use crate::replica;
use std::net::Ipv4Addr;

/// One member of the fixed cluster. The same port serves replica-to-replica and client RPCs.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicaMemberInfo {
    pub replica_id: String,
    pub ip_addr: Ipv4Addr,
    pub port: u16,
}

impl From<ReplicaMemberInfo> for replica::MemberInfo {
    fn from(member_info: ReplicaMemberInfo) -> Self {
        Self::new(
            replica::ReplicaId::new(member_info.replica_id),
            member_info.ip_addr,
            member_info.port,
        )
    }
}
