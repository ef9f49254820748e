use crate::actor::WeakActorClient;
use crate::replica::election::timers::clock::{Clock, RealClock};
use crate::replica::{LeaderTimerTick, Term};
use tokio::sync::oneshot;
use tokio::time::Duration;

/// HeartbeatTimerHandle keeps a leader's heartbeat task alive. The task ticks once right away so a
/// new leader announces itself immediately, then once per heartbeat period. Dropping the handle
/// stops it.
pub(crate) struct HeartbeatTimerHandle {
    _stop: oneshot::Sender<()>,
}

struct HeartbeatTimerTask<C: Clock> {
    stopped: oneshot::Receiver<()>,
    period: Duration,
    actor_client: WeakActorClient,
    tick: LeaderTimerTick,
    clock: C,
}

impl HeartbeatTimerHandle {
    pub(crate) fn spawn_timer_task(period: Duration, actor_client: WeakActorClient, term: Term) -> Self {
        let (task, handle) = HeartbeatTimerTask::new(period, actor_client, term, RealClock);
        tokio::task::spawn(task.run());

        handle
    }
}

impl<C: Clock> HeartbeatTimerTask<C> {
    fn new(period: Duration, actor_client: WeakActorClient, term: Term, clock: C) -> (Self, HeartbeatTimerHandle) {
        let (tx, rx) = oneshot::channel();
        let task = HeartbeatTimerTask {
            stopped: rx,
            period,
            actor_client,
            tick: LeaderTimerTick { term },
            clock,
        };

        (task, HeartbeatTimerHandle { _stop: tx })
    }

    async fn run(mut self) {
        let mut next_tick = self.clock.now();
        loop {
            tokio::select! {
                biased;
                _ = &mut self.stopped => return,
                _ = self.clock.sleep_until(next_tick) => {
                    if self.actor_client.leader_timer(self.tick.clone()).await.is_err() {
                        return;
                    }
                    // Missed periods are skipped rather than replayed.
                    next_tick = self.clock.now() + self.period;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorClient;
    use crate::replica::election::timers::clock;
    use crate::replica::election::timers::test_support::EventProbe;

    #[tokio::test]
    async fn ticks_immediately_then_every_period() {
        let period = Duration::from_millis(100);
        let (actor_client, rx) = ActorClient::new(10);
        let mut probe = EventProbe::new(rx);
        let (clock, mut driver) = clock::manual_clock();
        let expected = LeaderTimerTick { term: Term::new(4) };

        let (task, _handle) = HeartbeatTimerTask::new(period, actor_client.weak(), Term::new(4), clock);
        tokio::task::spawn(task.run());

        probe.expect_leader_tick(&expected).await;
        probe.expect_silence().await;

        for _ in 0..3 {
            driver.advance(period / 2);
            probe.expect_silence().await;
            driver.advance(period / 2);
            probe.expect_leader_tick(&expected).await;
        }

        // A long stall produces a single catch-up tick.
        driver.advance(period * 5);
        probe.expect_leader_tick(&expected).await;
        probe.expect_silence().await;
    }

    #[tokio::test]
    async fn dropping_handle_stops_ticks() {
        let period = Duration::from_millis(100);
        let (actor_client, rx) = ActorClient::new(10);
        let mut probe = EventProbe::new(rx);
        let (clock, mut driver) = clock::manual_clock();
        let expected = LeaderTimerTick { term: Term::new(1) };

        let (task, handle) = HeartbeatTimerTask::new(period, actor_client.weak(), Term::new(1), clock);
        let join_handle = tokio::task::spawn(task.run());
        probe.expect_leader_tick(&expected).await;

        drop(handle);
        driver.advance(period);
        join_handle.await.unwrap();
        probe.expect_silence().await;
    }
}
