//! One-shot completion signalling for blocking submissions.
//!
//! The [`Completion`] half travels inside the wrapped operation; the
//! [`Waiter`] half stays with the caller. A completion that is dropped without
//! being fired (the operation panicked, or was discarded by `stop`) reports
//! `false`, so a blocked caller is never stranded.

use std::sync::mpsc::{self, Receiver, SyncSender};

/// Create a connected completion/waiter pair.
pub fn completion() -> (Completion, Waiter) {
    let (tx, rx) = mpsc::sync_channel(1);
    (Completion { tx: Some(tx) }, Waiter { rx })
}

/// Sending half; fires exactly once.
#[derive(Debug)]
pub struct Completion {
    tx: Option<SyncSender<bool>>,
}

impl Completion {
    /// Report whether the operation ran to completion.
    pub fn complete(mut self, completed: bool) {
        self.fire(completed);
    }

    fn fire(&mut self, completed: bool) {
        if let Some(tx) = self.tx.take() {
            // Capacity 1 and a single send: never blocks. The waiter may be gone.
            let _ = tx.try_send(completed);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.fire(false);
    }
}

/// Receiving half, owned by the blocked caller.
#[derive(Debug)]
pub struct Waiter {
    rx: Receiver<bool>,
}

impl Waiter {
    /// Block until the completion fires.
    pub fn wait(self) -> bool {
        self.rx.recv().unwrap_or(false)
    }
}
