// netconnection/src/looper.rs
//! Callback executors.
//!
//! Results never reach a [`NetworkDelegate`](crate::NetworkDelegate) on the
//! I/O thread. They are boxed and posted to a [`CallbackExecutor`], which runs
//! them on its designated thread in posting order.

use log::warn;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, ThreadId};
use std::time::Duration;

pub type Callback = Box<dyn FnOnce() + Send + 'static>;

pub trait CallbackExecutor: Send + Sync {
    /// Queue `callback` to run on the designated thread.
    fn post(&self, callback: Callback);
}

/// Cloneable sending side of a looper queue.
#[derive(Clone)]
pub struct LooperHandle {
    sender: Sender<Callback>,
    thread: ThreadId,
}

impl LooperHandle {
    /// The thread the callbacks posted here run on.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }
}

impl CallbackExecutor for LooperHandle {
    fn post(&self, callback: Callback) {
        if self.sender.send(callback).is_err() {
            warn!("looper is gone, dropping callback");
        }
    }
}

/// A callback queue pumped by the thread that created it.
///
/// The receiving end is not `Sync`, so the queue can only be drained by its
/// owner; posts may come from any thread through [`MainLooper::handle`].
pub struct MainLooper {
    receiver: Receiver<Callback>,
    handle: LooperHandle,
}

impl MainLooper {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            receiver,
            handle: LooperHandle {
                sender,
                thread: thread::current().id(),
            },
        }
    }

    pub fn handle(&self) -> LooperHandle {
        self.handle.clone()
    }

    /// Run every callback already queued and return how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.receiver.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one callback and run it.
    pub fn run_next(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(callback) => {
                callback();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

impl Default for MainLooper {
    fn default() -> Self {
        Self::new()
    }
}

/// A looper running on its own dedicated thread.
///
/// The thread exits once the looper and every handle taken from it are
/// dropped, after running whatever is still queued.
pub struct ThreadLooper {
    handle: LooperHandle,
}

impl ThreadLooper {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Callback>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for callback in receiver {
                    callback();
                }
            })?;
        let thread = worker.thread().id();
        Ok(Self {
            handle: LooperHandle { sender, thread },
        })
    }

    pub fn handle(&self) -> LooperHandle {
        self.handle.clone()
    }
}

impl CallbackExecutor for ThreadLooper {
    fn post(&self, callback: Callback) {
        self.handle.post(callback);
    }
}
