use tokio::time::Instant;
#[cfg(test)]
use tokio::{sync::watch, time::Duration};

/// Clock lets the timer tasks run against real tokio time or against a hand-driven test clock.
#[async_trait::async_trait]
pub(crate) trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    async fn sleep_until(&mut self, deadline: Instant);
}

#[derive(Copy, Clone)]
pub(crate) struct RealClock;

#[async_trait::async_trait]
impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
pub(crate) fn manual_clock() -> (ManualClock, ManualClockDriver) {
    let start = Instant::now();
    let (tx, rx) = watch::channel(start);

    (ManualClock { now: rx }, ManualClockDriver { now: tx, start })
}

/// ManualClock only moves when its driver says so.
#[cfg(test)]
#[derive(Clone)]
pub(crate) struct ManualClock {
    now: watch::Receiver<Instant>,
}

#[cfg(test)]
#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.borrow()
    }

    async fn sleep_until(&mut self, deadline: Instant) {
        while *self.now.borrow() < deadline {
            if self.now.changed().await.is_err() {
                // Driver is gone, time stands still forever.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
pub(crate) struct ManualClockDriver {
    now: watch::Sender<Instant>,
    start: Instant,
}

#[cfg(test)]
impl ManualClockDriver {
    pub(crate) fn elapsed(&self) -> Duration {
        *self.now.borrow() - self.start
    }

    /// Sleepers wake once `now` reaches their deadline, not at the deadline itself. Advance in
    /// steps no larger than the granularity the test wants to observe.
    pub(crate) fn advance(&mut self, step: Duration) {
        let next = *self.now.borrow() + step;
        self.now.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn manual_clock_wakes_sleepers_only_when_advanced() {
        let period = Duration::from_millis(200);
        let (mut clock, mut driver) = manual_clock();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first_deadline = clock.now() + period;
        tokio::spawn(async move {
            let mut deadline = first_deadline;
            loop {
                clock.sleep_until(deadline).await;
                if tx.send(deadline).is_err() {
                    return;
                }
                deadline += period;
            }
        });

        // Real time passing does nothing.
        tokio::time::timeout(period * 2, rx.recv())
            .await
            .expect_err("clock should not have moved");

        driver.advance(period);
        assert_eq!(rx.recv().await.unwrap(), first_deadline);

        // One big leap releases every deadline it passes.
        driver.advance(period * 2);
        assert_eq!(rx.recv().await.unwrap(), first_deadline + period);
        assert_eq!(rx.recv().await.unwrap(), first_deadline + period * 2);
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .expect_err("no further deadline has passed");

        assert_eq!(driver.elapsed(), period * 3);
    }
}
