// SPDX-License-Identifier: MPL-2.0

//! Serial worker queues
//!
//! A worker queue is a dedicated thread that owns a piece of state and runs
//! submitted jobs against it one at a time, in submission order. Handles can
//! be created (and jobs queued) before the thread starts, which lets the
//! encoder's output routing reference the writing queue before the container
//! writer exists.
//!
//! A queue shuts down once every handle is dropped; its state is dropped on
//! the worker thread.

use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Create a queue whose worker has not started yet
pub fn channel<T>(label: &'static str) -> (QueueHandle<T>, PendingQueue<T>) {
    let (sender, receiver) = mpsc::channel();
    (
        QueueHandle { label, sender },
        PendingQueue { label, receiver },
    )
}

/// Submission side of a worker queue
pub struct QueueHandle<T> {
    label: &'static str,
    sender: mpsc::Sender<Job<T>>,
}

impl<T> Clone for QueueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label,
            sender: self.sender.clone(),
        }
    }
}

impl<T> QueueHandle<T> {
    /// Queue a job behind every job submitted before it
    ///
    /// Returns `false` when the worker is gone and the job was discarded.
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if self.sender.send(Box::new(job)).is_err() {
            warn!(queue = self.label, "Worker queue closed, job discarded");
            return false;
        }
        true
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T> std::fmt::Debug for QueueHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("label", &self.label)
            .finish()
    }
}

/// Receiving side of a queue that has no worker yet
pub struct PendingQueue<T> {
    label: &'static str,
    receiver: mpsc::Receiver<Job<T>>,
}

impl<T: Send + 'static> PendingQueue<T> {
    /// Spawn the worker thread with its state
    ///
    /// Jobs queued before this call run first, in order.
    pub fn start(self, mut state: T) -> std::io::Result<()> {
        let label = self.label;
        let receiver = self.receiver;

        thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                debug!(queue = label, "Worker queue started");
                let mut jobs = 0u64;
                while let Ok(job) = receiver.recv() {
                    job(&mut state);
                    jobs += 1;
                }
                debug!(queue = label, jobs, "Worker queue finished");
            })?;

        Ok(())
    }
}
