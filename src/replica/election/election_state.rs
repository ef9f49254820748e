use crate::actor::WeakActorClient;
use crate::replica::election::state_change_listener::{self, ElectionStateChangeNotifier};
use crate::replica::election::timers::{ElectionTimerHandle, HeartbeatTimerHandle};
use crate::replica::{ElectionStateChangeListener, ElectionStateSnapshot, ReplicaId, Term};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct ElectionConfig {
    pub my_replica_id: ReplicaId,
    pub leader_heartbeat_duration: Duration,
    pub follower_min_timeout: Duration,
    pub follower_max_timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CurrentLeader {
    Me,
    Other(ReplicaId),
    Unknown,
}

/// ElectionState is responsible for holding state specific to the stage in an election, and the
/// timer that goes with that stage. Its methods are responsible for "what" to do. It is NOT
/// responsible for validating terms or votes, or knowing "when" to do something.
pub(crate) struct ElectionState {
    state: State,
    config: ElectionConfig,
    actor_client: WeakActorClient,
    state_change_notifier: ElectionStateChangeNotifier,
}

impl ElectionState {
    /// `new_follower()` creates a new ElectionState instance that starts out as a follower,
    /// optionally already pointed at a known leader.
    pub(crate) fn new_follower(
        config: ElectionConfig,
        actor_client: WeakActorClient,
        known_leader: Option<ReplicaId>,
    ) -> (Self, ElectionStateChangeListener) {
        let initial_state = State::Follower(FollowerState::new(
            known_leader,
            config.follower_min_timeout,
            config.follower_max_timeout,
            actor_client.clone(),
        ));
        let (notifier, listener) = state_change_listener::new(Self::current_state_impl(&initial_state));

        let election_state = Self {
            state: initial_state,
            config,
            actor_client,
            state_change_notifier: notifier,
        };

        (election_state, listener)
    }

    pub(crate) fn transition_to_follower(&mut self, new_leader: Option<ReplicaId>) {
        self.state = State::Follower(FollowerState::new(
            new_leader,
            self.config.follower_min_timeout,
            self.config.follower_max_timeout,
            self.actor_client.clone(),
        ));
        self.notify_new_state();
    }

    /// Each call arms a fresh randomized election timer, so a failed election retries.
    pub(crate) fn transition_to_candidate_and_vote_for_self(&mut self) {
        let mut cs = CandidateState::new(
            self.config.follower_min_timeout,
            self.config.follower_max_timeout,
            self.actor_client.clone(),
        );

        // Vote for self
        cs.add_received_vote(self.config.my_replica_id.clone());

        self.state = State::Candidate(cs);
        self.notify_new_state();
    }

    pub(crate) fn transition_to_leader(&mut self, term: Term) {
        self.state = State::Leader(LeaderState::new(
            self.config.leader_heartbeat_duration,
            self.actor_client.clone(),
            term,
        ));
        self.notify_new_state();
    }

    /// Recognize `leader` as the leader of the current term. Any candidate or leader steps down.
    /// A follower already following `leader` keeps its state (and timer).
    pub(crate) fn follow(&mut self, leader: &ReplicaId) {
        match &mut self.state {
            State::Follower(fs) if fs.leader.as_ref() == Some(leader) => {}
            State::Follower(fs) if fs.leader.is_none() => {
                fs.leader = Some(leader.clone());
                self.notify_new_state();
            }
            _ => self.transition_to_follower(Some(leader.clone())),
        }
    }

    fn current_state_impl(state: &State) -> ElectionStateSnapshot {
        match state {
            State::Leader(_) => ElectionStateSnapshot::Leader,
            State::Candidate(_) => ElectionStateSnapshot::Candidate,
            State::Follower(FollowerState { leader: None, .. }) => ElectionStateSnapshot::FollowerNoLeader,
            State::Follower(FollowerState {
                leader: Some(leader_id),
                ..
            }) => ElectionStateSnapshot::Follower(leader_id.clone()),
        }
    }

    pub(crate) fn current_leader(&self) -> CurrentLeader {
        match &self.state {
            State::Leader(_) => CurrentLeader::Me,
            State::Candidate(_) => CurrentLeader::Unknown,
            State::Follower(FollowerState { leader: None, .. }) => CurrentLeader::Unknown,
            State::Follower(FollowerState {
                leader: Some(leader_id),
                ..
            }) => CurrentLeader::Other(leader_id.clone()),
        }
    }

    pub(crate) fn is_leader(&self) -> bool {
        matches!(self.state, State::Leader(_))
    }

    fn notify_new_state(&self) {
        self.state_change_notifier
            .notify_new_state(Self::current_state_impl(&self.state));
    }

    pub(crate) fn reset_timeout_if_follower(&self) {
        if let State::Follower(fs) = &self.state {
            fs.reset_timeout();
        }
    }

    /// Return number of votes received if candidate, or None if no longer Candidate.
    pub(crate) fn add_vote_if_candidate(&mut self, vote_from: ReplicaId) -> Option<usize> {
        if let State::Candidate(cs) = &mut self.state {
            Some(cs.add_received_vote(vote_from))
        } else {
            None
        }
    }

    /// Number of votes received so far, or None if not a candidate.
    pub(crate) fn num_votes_if_candidate(&self) -> Option<usize> {
        if let State::Candidate(cs) = &self.state {
            Some(cs.received_votes_from.len())
        } else {
            None
        }
    }
}

impl fmt::Debug for ElectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Leader(_) => write!(f, "Leader"),
            State::Candidate(cs) => write!(f, "Candidate(Votes={})", cs.received_votes_from.len()),
            State::Follower(FollowerState {
                leader: Some(leader_id),
                ..
            }) => write!(f, "Follower(Leader={:?})", leader_id),
            State::Follower(FollowerState { leader: None, .. }) => write!(f, "Follower(Leader=None)"),
        }
    }
}

enum State {
    Leader(LeaderState),
    Candidate(CandidateState),
    Follower(FollowerState),
}

struct LeaderState {
    // Dropping this stops the heartbeat task.
    _heartbeat_timer: HeartbeatTimerHandle,
}

struct CandidateState {
    received_votes_from: HashSet<ReplicaId>,
    _election_timer: ElectionTimerHandle,
}

struct FollowerState {
    leader: Option<ReplicaId>,
    election_timer: ElectionTimerHandle,
}

impl LeaderState {
    fn new(heartbeat_duration: Duration, actor_client: WeakActorClient, term: Term) -> Self {
        Self {
            _heartbeat_timer: HeartbeatTimerHandle::spawn_timer_task(heartbeat_duration, actor_client, term),
        }
    }
}

impl CandidateState {
    fn new(min_timeout: Duration, max_timeout: Duration, actor_client: WeakActorClient) -> Self {
        Self {
            received_votes_from: HashSet::with_capacity(3),
            _election_timer: ElectionTimerHandle::spawn_timer_task(min_timeout, max_timeout, actor_client),
        }
    }

    /// `add_received_vote()` returns the number of unique votes we've received after adding the
    /// provided `vote_from`
    fn add_received_vote(&mut self, vote_from: ReplicaId) -> usize {
        self.received_votes_from.insert(vote_from);
        self.received_votes_from.len()
    }
}

impl FollowerState {
    fn new(
        leader: Option<ReplicaId>,
        min_timeout: Duration,
        max_timeout: Duration,
        actor_client: WeakActorClient,
    ) -> Self {
        Self {
            leader,
            election_timer: ElectionTimerHandle::spawn_timer_task(min_timeout, max_timeout, actor_client),
        }
    }

    fn reset_timeout(&self) {
        self.election_timer.reset_timeout();
    }
}
