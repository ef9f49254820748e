use std::convert::TryFrom;
use tokio::time::Duration;

/// Timing knobs for a replica. Anything left `None` falls back to a default.
#[derive(Clone, Debug, Default)]
pub struct RaftOptions {
    pub leader_heartbeat_duration: Option<Duration>,
    pub follower_min_timeout: Option<Duration>,
    pub follower_max_timeout: Option<Duration>,
    /// Bound on each RequestVote/Heartbeat call to a peer.
    pub peer_rpc_timeout: Option<Duration>,
    /// Bound on relaying a client request to the leader.
    pub client_forward_timeout: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct RaftOptionsValidated {
    pub leader_heartbeat_duration: Duration,
    pub follower_min_timeout: Duration,
    pub follower_max_timeout: Duration,
    pub peer_rpc_timeout: Duration,
    pub client_forward_timeout: Duration,
}

impl RaftOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.leader_heartbeat_duration >= self.follower_min_timeout {
            return Err("Follower minimum timeout must be greater than leader's heartbeat");
        }
        if self.follower_min_timeout >= self.follower_max_timeout {
            return Err("Follower minimum timeout must be less than maximum timeout");
        }
        if self.peer_rpc_timeout >= self.follower_min_timeout {
            return Err("Peer RPC timeout must be less than the follower's minimum timeout");
        }
        if self.client_forward_timeout == Duration::from_millis(0) {
            return Err("Client forward timeout must be non-zero");
        }

        Ok(())
    }
}

impl TryFrom<RaftOptions> for RaftOptionsValidated {
    type Error = &'static str;

    fn try_from(options: RaftOptions) -> Result<Self, Self::Error> {
        let values = RaftOptionsValidated {
            leader_heartbeat_duration: options.leader_heartbeat_duration.unwrap_or(Duration::from_millis(100)),
            follower_min_timeout: options.follower_min_timeout.unwrap_or(Duration::from_millis(500)),
            follower_max_timeout: options.follower_max_timeout.unwrap_or(Duration::from_millis(1500)),
            peer_rpc_timeout: options.peer_rpc_timeout.unwrap_or(Duration::from_millis(300)),
            client_forward_timeout: options.client_forward_timeout.unwrap_or(Duration::from_secs(2)),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let validated = RaftOptionsValidated::try_from(RaftOptions::default()).unwrap();

        assert_eq!(validated.leader_heartbeat_duration, Duration::from_millis(100));
        assert_eq!(validated.follower_min_timeout, Duration::from_millis(500));
        assert_eq!(validated.follower_max_timeout, Duration::from_millis(1500));
        assert_eq!(validated.peer_rpc_timeout, Duration::from_millis(300));
    }

    #[test]
    fn heartbeat_must_beat_election_timeout() {
        let options = RaftOptions {
            leader_heartbeat_duration: Some(Duration::from_millis(500)),
            ..RaftOptions::default()
        };
        assert!(RaftOptionsValidated::try_from(options).is_err());
    }

    #[test]
    fn timeout_window_must_be_ordered() {
        let options = RaftOptions {
            follower_min_timeout: Some(Duration::from_millis(2000)),
            ..RaftOptions::default()
        };
        assert!(RaftOptionsValidated::try_from(options).is_err());
    }

    #[test]
    fn peer_rpc_must_finish_before_election_timeout() {
        let options = RaftOptions {
            peer_rpc_timeout: Some(Duration::from_millis(600)),
            ..RaftOptions::default()
        };
        assert!(RaftOptionsValidated::try_from(options).is_err());
    }
}
