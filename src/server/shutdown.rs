use tokio::sync::oneshot;

/// Ties the RPC server's lifetime to the replica: the replica owns the handle, the server waits on
/// the signal. Dropping the handle (e.g. when the actor exits) stops the server.
pub(crate) fn shutdown_signal() -> (RpcServerShutdownHandle, RpcServerShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (RpcServerShutdownHandle { _tx: tx }, RpcServerShutdownSignal { rx })
}

pub(crate) struct RpcServerShutdownHandle {
    _tx: oneshot::Sender<()>,
}

pub(crate) struct RpcServerShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl RpcServerShutdownSignal {
    /// Resolves once the handle is dropped. Nothing is ever sent, so the error is the signal.
    pub(crate) async fn wait(self) {
        let _ = self.rx.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_fires_when_handle_dropped() {
        let (handle, signal) = shutdown_signal();
        let waiter = tokio::spawn(signal.wait());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        drop(handle);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("server should observe shutdown")
            .unwrap();
    }
}
