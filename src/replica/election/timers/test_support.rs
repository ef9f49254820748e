use crate::actor::Event;
use crate::replica::LeaderTimerTick;
use std::time::Duration;
use tokio::sync::mpsc;

/// EventProbe stands in for the replica actor and lets timer tests inspect what reached its queue.
pub(super) struct EventProbe {
    rx: mpsc::Receiver<Event>,
    quiet_period: Duration,
}

impl EventProbe {
    pub(super) fn new(rx: mpsc::Receiver<Event>) -> Self {
        EventProbe {
            rx,
            quiet_period: Duration::from_millis(10),
        }
    }

    async fn next(&mut self) -> Event {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for an actor event")
            .expect("actor queue closed")
    }

    pub(super) async fn expect_leader_tick(&mut self, expected: &LeaderTimerTick) {
        match self.next().await {
            Event::LeaderTimer(tick) => assert_eq!(&tick, expected),
            other => panic!("Expected leader tick, got {:?}", other),
        }
    }

    pub(super) async fn expect_follower_timeout(&mut self) {
        match self.next().await {
            Event::FollowerTimeout => {}
            other => panic!("Expected follower timeout, got {:?}", other),
        }
    }

    pub(super) async fn expect_silence(&mut self) {
        if let Ok(event) = tokio::time::timeout(self.quiet_period, self.rx.recv()).await {
            panic!("Expected no event, got {:?}", event);
        }
    }
}
