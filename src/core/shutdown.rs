//! Shutdown and Cancellation Coordination
//!
//! A `ShutdownCoordinator` owns the process-wide stop flag and broadcasts a
//! single notification when it is triggered, either programmatically or by a
//! termination signal. Long-running work holds a `CancelSignal` derived from
//! it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across the application
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
    shutdown_requested: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(8);
        Self {
            shutdown_tx,
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a cancellation handle bound to this coordinator
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            requested: self.shutdown_requested.clone(),
            rx: Some(self.shutdown_tx.subscribe()),
        }
    }

    pub fn trigger_shutdown(&self) {
        // Release pairs with the Acquire load in CancelSignal::is_cancelled
        self.shutdown_requested.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Trigger shutdown when the process receives SIGINT, SIGTERM, SIGHUP or
    /// SIGQUIT. A second signal exits immediately with status 130.
    pub fn install_signal_handlers(&self) {
        setup_signal_handlers(self.shutdown_tx.clone(), self.shutdown_requested.clone());
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation handle observed by the fetcher and the pipeline.
///
/// The flag is checked first so a handle created after the coordinator fired
/// still reports cancellation.
pub struct CancelSignal {
    requested: Arc<AtomicBool>,
    rx: Option<broadcast::Receiver<()>>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            rx: None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Resolve once cancellation has been requested
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        match self.rx.as_mut() {
            // Lagged implies at least one trigger was sent
            Some(rx) => loop {
                match rx.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
                    Err(broadcast::error::RecvError::Closed) => {
                        if self.requested.load(Ordering::Acquire) {
                            return;
                        }
                        std::future::pending::<()>().await;
                    }
                }
            },
            None => std::future::pending::<()>().await,
        }
    }
}

impl Clone for CancelSignal {
    fn clone(&self) -> Self {
        Self {
            requested: self.requested.clone(),
            rx: self.rx.as_ref().map(|rx| rx.resubscribe()),
        }
    }
}

fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>, shutdown_requested: Arc<AtomicBool>) {
    #[cfg(unix)]
    {
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }

        use std::sync::atomic::AtomicUsize;
        use tokio::signal::unix::{signal, SignalKind};
        let signal_count = Arc::new(AtomicUsize::new(0));
        let signals = [
            SignalKind::interrupt(),
            SignalKind::terminate(),
            SignalKind::hangup(),
            SignalKind::quit(),
        ];

        for kind in signals {
            let tx = shutdown_tx.clone();
            let requested = shutdown_requested.clone();
            let sig_ctr = signal_count.clone();

            tokio::spawn(async move {
                if let Ok(mut sig) = signal(kind) {
                    while sig.recv().await.is_some() {
                        let prev = sig_ctr.fetch_add(1, Ordering::AcqRel);
                        requested.store(true, Ordering::Release);
                        let _ = tx.send(());
                        if prev >= 1 {
                            log::warn!("Second termination signal received, exiting");
                            std::process::exit(130);
                        }
                        log::info!("Termination signal received, cancelling run");
                    }
                }
            });
        }
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown_requested.store(true, Ordering::Release);
                let _ = shutdown_tx.send(());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_coordinator_starts_idle() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.signal();

        assert!(!coordinator.is_shutdown_requested());
        assert!(!signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_trigger_wakes_waiting_signal() {
        let coordinator = ShutdownCoordinator::new();
        let mut signal = coordinator.signal();

        let waiter = tokio::spawn(async move {
            signal.cancelled().await;
        });
        coordinator.trigger_shutdown();

        let woke = timeout(Duration::from_millis(200), waiter).await;
        assert!(woke.is_ok(), "waiting signal should resolve after trigger");
        assert!(coordinator.is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_signal_created_after_trigger_is_cancelled() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.trigger_shutdown();

        let mut late = coordinator.signal();
        assert!(late.is_cancelled());
        let resolved = timeout(Duration::from_millis(50), late.cancelled()).await;
        assert!(resolved.is_ok());
    }

    #[tokio::test]
    async fn test_cloned_signals_all_observe_trigger() {
        let coordinator = ShutdownCoordinator::new();
        let mut first = coordinator.signal();
        let mut second = first.clone();

        coordinator.trigger_shutdown();

        assert!(timeout(Duration::from_millis(100), first.cancelled())
            .await
            .is_ok());
        assert!(timeout(Duration::from_millis(100), second.cancelled())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_never_signal_stays_pending() {
        let mut signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        let result = timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err(), "never() must not resolve");
    }
}
