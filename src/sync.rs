//! Trailing-edge debouncer on a worker thread. Only the last value scheduled
//! inside a window is delivered.

use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum Command<T> {
    Schedule(T),
    Flush,
}

pub struct Debouncer<T> {
    tx: Option<Sender<Command<T>>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn<F>(window: Duration, deliver: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("progress-sync".to_string())
            .spawn(move || run(rx, window, deliver))
            .context("Failed to start the progress sync worker")?;
        Ok(Self { tx: Some(tx), worker: Some(worker) })
    }

    /// Replaces any pending value and restarts the window.
    pub fn schedule(&self, value: T) {
        self.send(Command::Schedule(value));
    }

    /// Delivers the pending value now instead of waiting out the window.
    pub fn flush(&self) {
        self.send(Command::Flush);
    }

    fn send(&self, command: Command<T>) {
        let delivered = self.tx.as_ref().is_some_and(|tx| tx.send(command).is_ok());
        if !delivered {
            tracing::warn!("progress sync worker is gone, dropping update");
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        // Disconnecting makes the worker flush and exit
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("progress sync worker panicked");
            }
        }
    }
}

fn run<T, F: FnMut(T)>(rx: Receiver<Command<T>>, window: Duration, mut deliver: F) {
    let mut pending: Option<T> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let received = match deadline {
            Some(at) => rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Command::Schedule(value)) => {
                pending = Some(value);
                deadline = Some(Instant::now() + window);
            }
            Ok(Command::Flush) | Err(RecvTimeoutError::Timeout) => {
                deadline = None;
                if let Some(value) = pending.take() {
                    deliver(value);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(value) = pending.take() {
                    deliver(value);
                }
                break;
            }
        }
    }
}
