use crate::replica::ReplicaId;
use tokio::sync::watch;

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ElectionStateSnapshot {
    Leader,
    Candidate,
    Follower(ReplicaId),
    FollowerNoLeader,
}

pub(super) fn new(initial_state: ElectionStateSnapshot) -> (ElectionStateChangeNotifier, ElectionStateChangeListener) {
    let (snd, rcv) = watch::channel(initial_state);

    (ElectionStateChangeNotifier { snd }, ElectionStateChangeListener { rcv })
}

pub(super) struct ElectionStateChangeNotifier {
    snd: watch::Sender<ElectionStateSnapshot>,
}

impl ElectionStateChangeNotifier {
    pub(super) fn notify_new_state(&self, new_state: ElectionStateSnapshot) {
        // Skip no-op transitions (e.g. follower re-learning the same leader) so listeners only
        // wake up on real changes.
        self.snd.send_if_modified(|current| {
            if *current == new_state {
                false
            } else {
                *current = new_state;
                true
            }
        });
    }
}

/// ElectionStateChangeListener observes the latest election state. Intermediate states between two
/// calls to `next()` are clobbered into the most recent one.
#[derive(Clone)]
pub(crate) struct ElectionStateChangeListener {
    rcv: watch::Receiver<ElectionStateSnapshot>,
}

impl ElectionStateChangeListener {
    pub(crate) async fn next(&mut self) -> Option<ElectionStateSnapshot> {
        match self.rcv.changed().await {
            Ok(_) => Some(self.rcv.borrow().clone()),
            Err(_) => None,
        }
    }

    pub(crate) fn current(&self) -> ElectionStateSnapshot {
        self.rcv.borrow().clone()
    }
}
