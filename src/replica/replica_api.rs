use crate::chat::ReplicatedSnapshot;
use crate::replica::local_state::Term;
use crate::replica::peer_client::PeerHandle;
use crate::replica::peers::ReplicaId;

#[derive(Debug, thiserror::Error)]
#[error("Replica actor has exited")]
pub struct ActorExited;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RequestVoteInput {
    pub(crate) candidate_term: Term,
    pub(crate) candidate_id: ReplicaId,
}

#[derive(Debug, PartialEq)]
pub(crate) struct RequestVoteOutput {
    pub(crate) term: Term,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum RequestVoteError {
    #[error("Requesting candidate is not in the cluster")]
    CandidateNotInCluster,
    #[error("Requesting candidate's term is out of date")]
    StaleTerm(TermOutOfDateInfo),
    #[error("Already voted for {voted_for:?} this term")]
    VoteAlreadyCast { current_term: Term, voted_for: ReplicaId },
    #[error("We (server) are unavailable because actor is dead RIP")]
    ActorExited,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HeartbeatInput {
    pub(crate) leader_term: Term,
    pub(crate) leader_id: ReplicaId,
    pub(crate) snapshot: ReplicatedSnapshot,
}

#[derive(Debug, PartialEq)]
pub(crate) struct HeartbeatOutput {
    pub(crate) term: Term,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum HeartbeatError {
    #[error("Leader is not in cluster")]
    LeaderNotInCluster,
    #[error("Leader's term is out of date")]
    StaleTerm(TermOutOfDateInfo),
    #[error("We (server) are unavailable because actor is dead RIP")]
    ActorExited,
}

#[derive(Debug, PartialEq)]
pub(crate) struct TermOutOfDateInfo {
    pub(crate) current_term: Term,
}

/// Failure to get an answer out of a peer. Treated as a non-vote or non-ack, never as a crash.
#[derive(thiserror::Error, Debug)]
pub(crate) enum RpcReplyError {
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),
    #[error("Timed out waiting for peer")]
    Timeout,
}

#[derive(Debug)]
pub(crate) struct RequestVoteReplyFromPeer {
    pub(crate) peer_id: ReplicaId,
    // Term we requested the vote for.
    pub(crate) term: Term,
    pub(crate) result: Result<PeerVote, RpcReplyError>,
}

#[derive(Debug, PartialEq)]
pub(crate) struct PeerVote {
    pub(crate) term: Term,
    pub(crate) vote_granted: bool,
}

#[derive(Debug)]
pub(crate) struct HeartbeatReplyFromPeer {
    pub(crate) peer_id: ReplicaId,
    // Term we sent the heartbeat in.
    pub(crate) term: Term,
    pub(crate) result: Result<PeerAck, RpcReplyError>,
}

#[derive(Debug, PartialEq)]
pub(crate) struct PeerAck {
    pub(crate) term: Term,
    pub(crate) accepted: bool,
}

/// LeaderTimerTick is a single tick of a leader's heartbeat timer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LeaderTimerTick {
    pub(crate) term: Term,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SubmitError {
    #[error("I'm not leader")]
    LeaderRedirect(PeerHandle),

    // Likely an election is in progress.
    #[error("Cluster is in a tough shape. No one is leader.")]
    NoLeader,

    #[error("Replica actor is dead RIP")]
    ActorExited,
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("No leader has been observed")]
pub struct NoKnownLeader;

#[derive(Debug, thiserror::Error)]
pub enum LeaderLookupError {
    #[error(transparent)]
    NoKnownLeader(#[from] NoKnownLeader),
    #[error(transparent)]
    ActorExited(#[from] ActorExited),
}

// ------- Conversions --------

impl From<ActorExited> for RequestVoteError {
    fn from(_: ActorExited) -> Self {
        RequestVoteError::ActorExited
    }
}

impl From<ActorExited> for HeartbeatError {
    fn from(_: ActorExited) -> Self {
        HeartbeatError::ActorExited
    }
}

impl From<ActorExited> for SubmitError {
    fn from(_: ActorExited) -> Self {
        SubmitError::ActorExited
    }
}
