use crate::chat::{ChatRequest, ChatResponse, ReplicatedSnapshot};
use crate::replica::application::ApplicationAdapter;
use crate::replica::election::{CurrentLeader, ElectionState};
use crate::replica::local_state::{PersistentLocalState, Term};
use crate::replica::peer_client::PeerHandle;
use crate::replica::peers::{ClusterTracker, ReplicaId};
use crate::replica::replica_api::{
    HeartbeatError, HeartbeatInput, HeartbeatOutput, HeartbeatReplyFromPeer, LeaderTimerTick, NoKnownLeader,
    RequestVoteError, RequestVoteInput, RequestVoteOutput, RequestVoteReplyFromPeer, SubmitError, TermOutOfDateInfo,
};
use crate::replica::replication::ReplicationStrategy;
use crate::replica::transport::RaftTransport;
use crate::server;

/// Replica is the consensus engine of one cluster member. It is driven by `ReplicaActor`, so every
/// method here runs with exclusive access to term, vote, election state, and application state.
pub(crate) struct Replica {
    logger: slog::Logger,
    my_replica_id: ReplicaId,
    cluster_tracker: ClusterTracker,
    local_state: Box<dyn PersistentLocalState>,
    election_state: ElectionState,
    replication: Box<dyn ReplicationStrategy>,
    application: Box<dyn ApplicationAdapter>,
    transport: Box<dyn RaftTransport>,
    // Held so the RPC server stops when the replica is dropped.
    _server_shutdown_handle: server::RpcServerShutdownHandle,
}

impl Replica {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        logger: slog::Logger,
        cluster_tracker: ClusterTracker,
        local_state: Box<dyn PersistentLocalState>,
        election_state: ElectionState,
        replication: Box<dyn ReplicationStrategy>,
        application: Box<dyn ApplicationAdapter>,
        transport: Box<dyn RaftTransport>,
        server_shutdown_handle: server::RpcServerShutdownHandle,
    ) -> Self {
        Replica {
            logger,
            my_replica_id: cluster_tracker.my_replica_id().clone(),
            cluster_tracker,
            local_state,
            election_state,
            replication,
            application,
            transport,
            _server_shutdown_handle: server_shutdown_handle,
        }
    }

    // ------- Inbound RPCs --------

    pub(crate) fn handle_request_vote(
        &mut self,
        input: RequestVoteInput,
    ) -> Result<RequestVoteOutput, RequestVoteError> {
        if !self.cluster_tracker.contains_member(&input.candidate_id) {
            return Err(RequestVoteError::CandidateNotInCluster);
        }

        // Read our local term/vote state as 1 atomic action.
        let (current_term, mut opt_voted_for) = self.local_state.voted_for_current_term();

        if input.candidate_term < current_term {
            slog::info!(
                self.logger,
                "Not granting vote to {:?}. Candidate term {:?} is behind ours {:?}.",
                input.candidate_id,
                input.candidate_term,
                current_term
            );
            return Err(RequestVoteError::StaleTerm(TermOutOfDateInfo { current_term }));
        }

        if self.local_state.store_term_if_increased(input.candidate_term) {
            self.election_state.transition_to_follower(None);
            slog::info!(
                self.logger,
                "Observed term {:?} in RequestVote. Election state: {:?}",
                input.candidate_term,
                self.election_state
            );
            opt_voted_for = None;
        }

        match opt_voted_for {
            Some(voted_for) if voted_for == input.candidate_id => {
                // Candidate retried. Same answer as before.
                self.election_state.reset_timeout_if_follower();
                Ok(RequestVoteOutput {
                    term: input.candidate_term,
                })
            }
            Some(voted_for) => {
                slog::info!(self.logger, "Not granting vote. We already voted for {:?}.", voted_for);
                Err(RequestVoteError::VoteAlreadyCast {
                    current_term: input.candidate_term,
                    voted_for,
                })
            }
            None => {
                let stored = self
                    .local_state
                    .store_vote_for_term_if_unvoted(input.candidate_term, input.candidate_id.clone());
                if !stored {
                    // Impossible with `&mut self`, but don't grant a vote we didn't record.
                    let (_, voted_for) = self.local_state.voted_for_current_term();
                    slog::error!(self.logger, "Failed to record vote. Current vote: {:?}", voted_for);
                    return Err(RequestVoteError::VoteAlreadyCast {
                        current_term: input.candidate_term,
                        voted_for: voted_for.unwrap_or_else(|| self.my_replica_id.clone()),
                    });
                }

                slog::info!(
                    self.logger,
                    "Voting for {:?} in term {:?}.",
                    input.candidate_id,
                    input.candidate_term
                );
                self.election_state.reset_timeout_if_follower();
                Ok(RequestVoteOutput {
                    term: input.candidate_term,
                })
            }
        }
    }

    pub(crate) fn handle_heartbeat(&mut self, input: HeartbeatInput) -> Result<HeartbeatOutput, HeartbeatError> {
        if !self.cluster_tracker.contains_member(&input.leader_id) || input.leader_id == self.my_replica_id {
            return Err(HeartbeatError::LeaderNotInCluster);
        }

        let current_term = self.local_state.current_term();
        if input.leader_term < current_term {
            slog::info!(
                self.logger,
                "Rejecting heartbeat from {:?}. Leader term {:?} is behind ours {:?}.",
                input.leader_id,
                input.leader_term,
                current_term
            );
            return Err(HeartbeatError::StaleTerm(TermOutOfDateInfo { current_term }));
        }

        if self.local_state.store_term_if_increased(input.leader_term) {
            self.election_state
                .transition_to_follower(Some(input.leader_id.clone()));
            slog::info!(
                self.logger,
                "Observed term {:?} in heartbeat. Election state: {:?}",
                input.leader_term,
                self.election_state
            );
        } else {
            self.election_state.follow(&input.leader_id);
        }

        self.election_state.reset_timeout_if_follower();

        self.replication
            .incoming(self.application.as_mut(), input.snapshot);

        Ok(HeartbeatOutput {
            term: input.leader_term,
        })
    }

    // ------- Replies to our outbound RPCs --------

    pub(crate) fn handle_request_vote_reply_from_peer(&mut self, reply: RequestVoteReplyFromPeer) {
        let vote = match reply.result {
            Ok(vote) => vote,
            Err(e) => {
                slog::warn!(
                    self.logger,
                    "RequestVote to {:?} for term {:?} failed: {}",
                    reply.peer_id,
                    reply.term,
                    e
                );
                return;
            }
        };

        if self.step_down_if_term_increased(vote.term) {
            return;
        }

        let current_term = self.local_state.current_term();
        if current_term != reply.term {
            slog::info!(
                self.logger,
                "Received vote for outdated term {:?}, current term: {:?}.",
                reply.term,
                current_term
            );
            return;
        }

        if !vote.vote_granted {
            slog::info!(
                self.logger,
                "Vote not granted from {:?} for term {:?}",
                reply.peer_id,
                reply.term
            );
            return;
        }

        let num_votes_received = match self.election_state.add_vote_if_candidate(reply.peer_id) {
            Some(v) => v,
            None => {
                slog::info!(
                    self.logger,
                    "Received vote for term {:?} after transitioning to election state: {:?}",
                    reply.term,
                    self.election_state
                );
                return;
            }
        };

        let num_voting_replicas = self.cluster_tracker.num_voting_replicas();
        slog::info!(
            self.logger,
            "Received {}/{} votes for term {:?}",
            num_votes_received,
            num_voting_replicas,
            reply.term
        );

        if num_votes_received >= Self::get_majority_vote_count(num_voting_replicas) {
            self.become_leader(reply.term);
        }
    }

    pub(crate) fn handle_heartbeat_reply_from_peer(&mut self, reply: HeartbeatReplyFromPeer) {
        match reply.result {
            Ok(ack) => {
                if !self.step_down_if_term_increased(ack.term) && !ack.accepted {
                    slog::warn!(
                        self.logger,
                        "Heartbeat for term {:?} not accepted by {:?}",
                        reply.term,
                        reply.peer_id
                    );
                }
            }
            Err(e) => {
                slog::warn!(
                    self.logger,
                    "Heartbeat to {:?} for term {:?} failed: {}",
                    reply.peer_id,
                    reply.term,
                    e
                );
            }
        }
    }

    /// Return true if we adopted a newer term (and are now a follower).
    fn step_down_if_term_increased(&mut self, observed_term: Term) -> bool {
        if self.local_state.store_term_if_increased(observed_term) {
            self.election_state.transition_to_follower(None);
            slog::info!(
                self.logger,
                "Peer has newer term {:?}. Stepping down. Election state: {:?}",
                observed_term,
                self.election_state
            );
            true
        } else {
            false
        }
    }

    // ------- Timers --------

    pub(crate) fn handle_leader_timer(&mut self, tick: LeaderTimerTick) {
        let current_term = self.local_state.current_term();
        if tick.term != current_term || !self.election_state.is_leader() {
            slog::debug!(self.logger, "Dropping stale leader tick for term {:?}", tick.term);
            return;
        }

        let snapshot = self.replication.outgoing(self.application.as_ref());
        for peer_id in self.cluster_tracker.peer_ids() {
            self.transport.dispatch_heartbeat(
                &peer_id,
                HeartbeatInput {
                    leader_term: current_term,
                    leader_id: self.my_replica_id.clone(),
                    snapshot: snapshot.clone(),
                },
            );
        }
    }

    pub(crate) fn handle_follower_timeout(&mut self) {
        if self.election_state.is_leader() {
            slog::debug!(self.logger, "Ignoring election timeout while leader");
            return;
        }

        let new_term = self.local_state.increment_term_and_vote_for_self();
        self.election_state.transition_to_candidate_and_vote_for_self();
        slog::info!(
            self.logger,
            "Election timeout. Starting election for term {:?}.",
            new_term
        );

        let num_votes_received = self.election_state.num_votes_if_candidate().unwrap_or(0);
        if num_votes_received >= Self::get_majority_vote_count(self.cluster_tracker.num_voting_replicas()) {
            // Only possible in a single member cluster.
            self.become_leader(new_term);
            return;
        }

        for peer_id in self.cluster_tracker.peer_ids() {
            self.transport.dispatch_request_vote(
                &peer_id,
                RequestVoteInput {
                    candidate_term: new_term,
                    candidate_id: self.my_replica_id.clone(),
                },
            );
        }
    }

    fn become_leader(&mut self, term: Term) {
        self.election_state.transition_to_leader(term);
        slog::info!(self.logger, "Elected leader for term {:?}", term);
    }

    fn get_majority_vote_count(num_voting_replicas: usize) -> usize {
        (num_voting_replicas / 2) + 1
    }

    // ------- Client facing --------

    pub(crate) fn handle_client_request(&mut self, request: ChatRequest) -> Result<ChatResponse, SubmitError> {
        match self.election_state.current_leader() {
            CurrentLeader::Me => Ok(self.application.apply(request)),
            CurrentLeader::Other(leader_id) => match self.cluster_tracker.peer(&leader_id) {
                Some(leader) => Err(SubmitError::LeaderRedirect(leader.clone())),
                None => {
                    slog::error!(self.logger, "Leader {:?} has no peer handle. Wtf!", leader_id);
                    Err(SubmitError::NoLeader)
                }
            },
            CurrentLeader::Unknown => Err(SubmitError::NoLeader),
        }
    }

    pub(crate) fn is_leader(&self) -> bool {
        self.election_state.is_leader()
    }

    /// There is no stub for ourselves, so this is `NoKnownLeader` while we are the leader.
    pub(crate) fn current_leader_stub(&self) -> Result<PeerHandle, NoKnownLeader> {
        match self.election_state.current_leader() {
            CurrentLeader::Other(leader_id) => self.cluster_tracker.peer(&leader_id).cloned().ok_or(NoKnownLeader),
            CurrentLeader::Me | CurrentLeader::Unknown => Err(NoKnownLeader),
        }
    }

    pub(crate) fn load_snapshot(&self) -> ReplicatedSnapshot {
        self.application.load_snapshot()
    }
}
