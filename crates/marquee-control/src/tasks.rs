//! Tracked background work.
//!
//! Work detached from a request (notification delivery, for example) is
//! spawned here so shutdown can wait for it. Each task runs inside
//! `catch_unwind`: a panic is logged and the task ends, nothing else does.
//!
//! The handle list sits behind a std mutex that is never held across an
//! `.await`.

use crate::error::ControlError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<JoinHandle<()>>>,
    running: Arc<AtomicUsize>,
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `fut` on the runtime and track it until shutdown.
    pub fn spawn<F>(&self, name: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.running.fetch_add(1, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let handle = tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
                tracing::error!(
                    task = name,
                    panic = panic_message(panic.as_ref()),
                    "background task panicked"
                );
            }
            running.fetch_sub(1, Ordering::SeqCst);
        });

        let mut handles = self.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for every tracked task, including ones spawned
    /// while waiting.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ControlError> {
        let drain = async {
            loop {
                let batch: Vec<JoinHandle<()>> = self.lock().drain(..).collect();
                if batch.is_empty() {
                    break;
                }
                tracing::info!(pending = batch.len(), "waiting for background tasks");
                futures::future::join_all(batch).await;
            }
        };

        match tokio::time::timeout(timeout, drain).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ControlError::ShutdownTimedOut {
                pending: self.in_flight(),
                timeout,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        // Handles stay valid even if a holder panicked mid-push.
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shutdown_waits_for_work() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let done = done.clone();
            tasks.spawn("sleepy", async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        tasks.shutdown(Duration::from_secs(5)).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(tasks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        tasks.spawn("boom", async {
            panic!("mailer exploded");
        });
        let sibling = done.clone();
        tasks.spawn("fine", async move {
            sibling.fetch_add(1, Ordering::SeqCst);
        });

        tasks.shutdown(Duration::from_secs(5)).await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_is_bounded() {
        let tasks = BackgroundTasks::new();
        tasks.spawn("stuck", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let err = tasks
            .shutdown(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::ShutdownTimedOut { .. }));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
