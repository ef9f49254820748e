use crate::actor::WeakActorClient;
use crate::replica::election::timers::clock::{Clock, RealClock};
use rand::Rng;
use std::ops::RangeInclusive;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

/// ElectionTimerHandle owns a background task that notifies the actor with `FollowerTimeout` when
/// the deadline passes without a reset. Dropping the handle stops the task.
pub(crate) struct ElectionTimerHandle<C: Clock = RealClock> {
    deadline: watch::Sender<Instant>,
    timeout_range: RangeInclusive<Duration>,
    clock: C,
}

struct ElectionTimerTask<C: Clock> {
    deadline: watch::Receiver<Instant>,
    actor_client: WeakActorClient,
    clock: C,
    // Wait this long before re-notifying if the actor did nothing about the last timeout.
    retry_after: Duration,
}

impl ElectionTimerHandle {
    pub(crate) fn spawn_timer_task(
        min_timeout: Duration,
        max_timeout: Duration,
        actor_client: WeakActorClient,
    ) -> Self {
        let (task, handle) = ElectionTimerTask::new(min_timeout, max_timeout, actor_client, RealClock);
        tokio::task::spawn(task.run());

        handle
    }
}

impl<C: Clock> ElectionTimerHandle<C> {
    /// Pushes the deadline out to a fresh random point in the timeout range.
    pub(crate) fn reset_timeout(&self) {
        self.deadline.send_replace(self.random_deadline());
    }

    fn random_deadline(&self) -> Instant {
        let timeout = rand::thread_rng().gen_range(self.timeout_range.clone());
        self.clock.now() + timeout
    }
}

impl<C: Clock> ElectionTimerTask<C> {
    fn new(
        min_timeout: Duration,
        max_timeout: Duration,
        actor_client: WeakActorClient,
        clock: C,
    ) -> (Self, ElectionTimerHandle<C>) {
        let (tx, rx) = watch::channel(clock.now());
        let handle = ElectionTimerHandle {
            deadline: tx,
            timeout_range: RangeInclusive::new(min_timeout, max_timeout),
            clock: clock.clone(),
        };
        // Arm before the task can observe the deadline.
        handle.reset_timeout();

        let task = ElectionTimerTask {
            deadline: rx,
            actor_client,
            clock,
            retry_after: min_timeout,
        };

        (task, handle)
    }

    async fn run(mut self) {
        let mut wake_at = *self.deadline.borrow_and_update();
        loop {
            tokio::select! {
                biased;
                changed = self.deadline.changed() => {
                    if changed.is_err() {
                        // Handle dropped: the replica left this follower/candidate stage.
                        return;
                    }
                    wake_at = *self.deadline.borrow_and_update();
                }
                _ = self.clock.sleep_until(wake_at) => {
                    if self.actor_client.follower_timeout().await.is_err() {
                        return;
                    }
                    wake_at = self.clock.now() + self.retry_after;
                }
            }
        }
    }
}
