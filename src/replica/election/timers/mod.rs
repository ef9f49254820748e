mod clock;
mod election_timer;
mod heartbeat_timer;

#[cfg(test)]
mod test_support;

pub(super) use election_timer::ElectionTimerHandle;
pub(super) use heartbeat_timer::HeartbeatTimerHandle;
