// SPDX-License-Identifier: GPL-3.0-only

//! Capture cancellation
//!
//! A [`CancelHandle`] is held by whoever may abort a capture (UI, Ctrl-C
//! handler); any number of [`CancelToken`]s observe it. Tokens can be polled
//! between bracket frames or awaited alongside a slow external call.

use tokio::sync::watch;

/// Sender side: flips the shared flag
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

/// Receiver side: observes the shared flag
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

/// Create a connected handle and token
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelToken { receiver })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Another token for this handle
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }
}

impl CancelToken {
    /// Token that is never cancelled
    pub fn never() -> Self {
        let (handle, token) = cancel_pair();
        // Dropping the sender freezes the value at false
        drop(handle);
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once cancellation is requested
    ///
    /// Never resolves if the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
