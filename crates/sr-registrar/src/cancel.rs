use tokio::sync::watch;

/// Create a linked cancel handle and signal.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(Some(rx)))
}

/// Held by the caller of a registration.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Stop launching pipelines. Pipelines already running finish normally.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observed by pipelines right before they start any I/O.
#[derive(Debug, Clone)]
pub struct CancelSignal(Option<watch::Receiver<bool>>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self(None)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.as_ref().is_some_and(|rx| *rx.borrow())
    }
}
