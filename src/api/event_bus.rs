use crate::replica::ElectionStateChangeListener;
use crate::replica::ElectionStateSnapshot;

/// The local replica's view of the election. Only the latest state is kept: if several changes
/// happen between two calls to `next_event()`, the caller sees just the most recent one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ElectionEvent {
    Leader,
    Candidate,
    Follower { leader_replica_id: String },
    FollowerNoLeader,
}

pub struct EventListener {
    election_state_change_listener: ElectionStateChangeListener,
}

impl EventListener {
    pub(crate) fn new(election_state_change_listener: ElectionStateChangeListener) -> Self {
        EventListener {
            election_state_change_listener,
        }
    }

    /// `next_event()` waits for the election state to change. `None` once the replica has exited.
    pub async fn next_event(&mut self) -> Option<ElectionEvent> {
        self.election_state_change_listener
            .next()
            .await
            .map(ElectionEvent::from)
    }

    pub fn current(&self) -> ElectionEvent {
        ElectionEvent::from(self.election_state_change_listener.current())
    }
}

// ------- Conversions --------

impl From<ElectionStateSnapshot> for ElectionEvent {
    fn from(election_state: ElectionStateSnapshot) -> Self {
        match election_state {
            ElectionStateSnapshot::Leader => ElectionEvent::Leader,
            ElectionStateSnapshot::Candidate => ElectionEvent::Candidate,
            ElectionStateSnapshot::Follower(leader_id) => ElectionEvent::Follower {
                leader_replica_id: leader_id.into_inner(),
            },
            ElectionStateSnapshot::FollowerNoLeader => ElectionEvent::FollowerNoLeader,
        }
    }
}
