use crate::chat::{ChatRequest, ChatResponse, ReplicatedSnapshot};
use crate::replica;
use crate::replica::{
    ActorExited, HeartbeatError, HeartbeatInput, HeartbeatOutput, HeartbeatReplyFromPeer, LeaderLookupError,
    LeaderTimerTick, NoKnownLeader, PeerHandle, RequestVoteError, RequestVoteInput, RequestVoteOutput,
    RequestVoteReplyFromPeer, SubmitError,
};
use std::fmt::Debug;
use tokio::sync::{mpsc, oneshot};

// v1 Design choice: The actor owns everything that consensus and the application touch (term, vote,
// election state, chat state). Events are handled one at a time.
//
// v1 Design choice: Disk interaction (snapshot save) is synchronous inside the event handler.
#[derive(Debug)]
pub(crate) enum Event {
    // Leader: Step down if term increased. Otherwise reject (already voted for self).
    // Candidate: Step down if term increased. Otherwise reject (already voted for self).
    // Follower: Grant vote if unvoted this term. Reset timeout on grant.
    RequestVote(RequestVoteInput, Callback<RequestVoteOutput, RequestVoteError>),

    // Any state: Reject stale term. Otherwise become follower of the sender, reset timeout, and
    // overwrite application state with the received snapshot.
    Heartbeat(HeartbeatInput, Callback<HeartbeatOutput, HeartbeatError>),

    // Leader: discard (unless term increased)
    // Candidate: Count vote. Transition to leader if quorum vote.
    // Follower: discard (unless term increased)
    RequestVoteReplyFromPeer(RequestVoteReplyFromPeer),

    // Any state: Transition to follower if peer has a higher term. Otherwise only logged.
    HeartbeatReplyFromPeer(HeartbeatReplyFromPeer),

    // Leader: Load snapshot and broadcast heartbeat to all peers.
    // Candidate: NOT POSSIBLE - discard
    // Follower: NOT POSSIBLE - discard
    LeaderTimer(LeaderTimerTick),

    // Leader: NOT POSSIBLE - discard
    // Candidate: Start a new election in the next term.
    // Follower: Transition to candidate. Trigger new election.
    FollowerTimeout,

    // Leader: Apply to application state.
    // Candidate: Reject, no leader.
    // Follower: Redirect to leader.
    ClientRequest(ChatRequest, Callback<ChatResponse, SubmitError>),

    IsLeader(oneshot::Sender<bool>),
    CurrentLeaderStub(Callback<PeerHandle, NoKnownLeader>),
    LoadSnapshot(oneshot::Sender<ReplicatedSnapshot>),
}

#[derive(Debug)]
pub(crate) struct Callback<O: Debug, E: Debug>(oneshot::Sender<Result<O, E>>);

impl<O: Debug, E: Debug> Callback<O, E> {
    pub(crate) fn send(self, message: Result<O, E>) {
        // Caller may have given up waiting (e.g. RPC deadline). Nothing to do.
        let _ = self.0.send(message);
    }
}

/// ActorClient is the strong handle to the replica actor. The actor exits when all strong handles
/// are dropped.
#[derive(Clone)]
pub(crate) struct ActorClient {
    sender: mpsc::Sender<Event>,
}

/// WeakActorClient doesn't keep the actor alive. Background tasks (timers, peer calls, RPC servers)
/// hold this so they don't prevent shutdown.
#[derive(Clone)]
pub(crate) struct WeakActorClient {
    sender: mpsc::WeakSender<Event>,
}

impl ActorClient {
    pub(crate) fn new(buffer_size: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer_size);

        (ActorClient { sender: tx }, rx)
    }

    pub(crate) fn weak(&self) -> WeakActorClient {
        WeakActorClient {
            sender: self.sender.downgrade(),
        }
    }

    pub(crate) async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, RequestVoteError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::RequestVote(input, Callback(tx))).await?;

        rx.await.map_err(|_| ActorExited)?
    }

    pub(crate) async fn heartbeat(&self, input: HeartbeatInput) -> Result<HeartbeatOutput, HeartbeatError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Heartbeat(input, Callback(tx))).await?;

        rx.await.map_err(|_| ActorExited)?
    }

    pub(crate) async fn submit(&self, request: ChatRequest) -> Result<ChatResponse, SubmitError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::ClientRequest(request, Callback(tx))).await?;

        rx.await.map_err(|_| ActorExited)?
    }

    pub(crate) async fn is_leader(&self) -> Result<bool, ActorExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::IsLeader(tx)).await?;

        rx.await.map_err(|_| ActorExited)
    }

    pub(crate) async fn current_leader_stub(&self) -> Result<PeerHandle, LeaderLookupError> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::CurrentLeaderStub(Callback(tx))).await?;

        let stub = rx.await.map_err(|_| ActorExited)??;
        Ok(stub)
    }

    pub(crate) async fn load_snapshot(&self) -> Result<ReplicatedSnapshot, ActorExited> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::LoadSnapshot(tx)).await?;

        rx.await.map_err(|_| ActorExited)
    }

    pub(crate) async fn notify_request_vote_reply_from_peer(
        &self,
        reply: RequestVoteReplyFromPeer,
    ) -> Result<(), ActorExited> {
        self.send(Event::RequestVoteReplyFromPeer(reply)).await
    }

    pub(crate) async fn notify_heartbeat_reply_from_peer(
        &self,
        reply: HeartbeatReplyFromPeer,
    ) -> Result<(), ActorExited> {
        self.send(Event::HeartbeatReplyFromPeer(reply)).await
    }

    pub(crate) async fn leader_timer(&self, tick: LeaderTimerTick) -> Result<(), ActorExited> {
        self.send(Event::LeaderTimer(tick)).await
    }

    pub(crate) async fn follower_timeout(&self) -> Result<(), ActorExited> {
        self.send(Event::FollowerTimeout).await
    }

    async fn send(&self, event: Event) -> Result<(), ActorExited> {
        self.sender.send(event).await.map_err(|_| ActorExited)
    }
}

impl WeakActorClient {
    pub(crate) fn upgrade(&self) -> Result<ActorClient, ActorExited> {
        self.sender
            .upgrade()
            .map(|sender| ActorClient { sender })
            .ok_or(ActorExited)
    }

    pub(crate) async fn request_vote(&self, input: RequestVoteInput) -> Result<RequestVoteOutput, RequestVoteError> {
        self.upgrade()?.request_vote(input).await
    }

    pub(crate) async fn heartbeat(&self, input: HeartbeatInput) -> Result<HeartbeatOutput, HeartbeatError> {
        self.upgrade()?.heartbeat(input).await
    }

    pub(crate) async fn submit(&self, request: ChatRequest) -> Result<ChatResponse, SubmitError> {
        self.upgrade()?.submit(request).await
    }

    pub(crate) async fn notify_request_vote_reply_from_peer(
        &self,
        reply: RequestVoteReplyFromPeer,
    ) -> Result<(), ActorExited> {
        self.upgrade()?.notify_request_vote_reply_from_peer(reply).await
    }

    pub(crate) async fn notify_heartbeat_reply_from_peer(
        &self,
        reply: HeartbeatReplyFromPeer,
    ) -> Result<(), ActorExited> {
        self.upgrade()?.notify_heartbeat_reply_from_peer(reply).await
    }

    pub(crate) async fn leader_timer(&self, tick: LeaderTimerTick) -> Result<(), ActorExited> {
        self.upgrade()?.leader_timer(tick).await
    }

    pub(crate) async fn follower_timeout(&self) -> Result<(), ActorExited> {
        self.upgrade()?.follower_timeout().await
    }
}

/// ReplicaActor is replica logic in actor model.
pub(crate) struct ReplicaActor {
    logger: slog::Logger,
    receiver: mpsc::Receiver<Event>,
    replica: replica::Replica,
}

impl ReplicaActor {
    pub(crate) fn new(logger: slog::Logger, receiver: mpsc::Receiver<Event>, replica: replica::Replica) -> Self {
        ReplicaActor {
            logger,
            receiver,
            replica,
        }
    }

    pub(crate) async fn run_event_loop(mut self) {
        while let Some(event) = self.receiver.recv().await {
            self.handle_event(event);
        }

        slog::info!(self.logger, "All actor clients dropped. Replica event loop has exited.");
    }

    // This must NOT be async. Any long running work must be spawned on another task
    // and/or come back as an event to this actor.
    fn handle_event(&mut self, event: Event) {
        match event {
            Event::RequestVote(input, callback) => {
                let result = self.replica.handle_request_vote(input);
                callback.send(result);
            }
            Event::Heartbeat(input, callback) => {
                let result = self.replica.handle_heartbeat(input);
                callback.send(result);
            }
            Event::RequestVoteReplyFromPeer(reply) => {
                self.replica.handle_request_vote_reply_from_peer(reply);
            }
            Event::HeartbeatReplyFromPeer(reply) => {
                self.replica.handle_heartbeat_reply_from_peer(reply);
            }
            Event::LeaderTimer(tick) => {
                self.replica.handle_leader_timer(tick);
            }
            Event::FollowerTimeout => {
                self.replica.handle_follower_timeout();
            }
            Event::ClientRequest(request, callback) => {
                let result = self.replica.handle_client_request(request);
                callback.send(result);
            }
            Event::IsLeader(tx) => {
                let _ = tx.send(self.replica.is_leader());
            }
            Event::CurrentLeaderStub(callback) => {
                callback.send(self.replica.current_leader_stub());
            }
            Event::LoadSnapshot(tx) => {
                let _ = tx.send(self.replica.load_snapshot());
            }
        }
    }
}
