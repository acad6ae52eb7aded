// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded worker pool with FIFO submission and mutex-serialised output.

use crate::response::Response;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::debug;

/// Executes request futures with bounded concurrency, writing each
/// task's single response line under a shared mutex.
///
/// `threads` bounds how many tasks run at once. Permits are acquired
/// FIFO, in submission order, so the *n*-th concurrently-runnable task
/// starts in the order its request line was read — ordering of the
/// responses themselves is not guaranteed once more than one task is in
/// flight.
pub struct WorkerPool<W> {
    semaphore: Arc<Semaphore>,
    writer: Arc<Mutex<W>>,
    tasks: JoinSet<()>,
}

impl<W> WorkerPool<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a pool bounded at `threads` concurrent tasks, writing
    /// responses to `writer`.
    pub fn new(threads: usize, writer: W) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(threads.max(1))),
            writer: Arc::new(Mutex::new(writer)),
            tasks: JoinSet::new(),
        }
    }

    /// Write a line synchronously before any task is submitted — used for
    /// the `#SOFTWAREID` echo, which must precede every task's response.
    pub async fn write_line_now(&self, response: &Response) -> std::io::Result<()> {
        let mut w = self.writer.lock().await;
        w.write_all(response.to_line().as_bytes()).await?;
        w.flush().await
    }

    /// Submit a task. Blocks until a pool slot is free, then spawns the
    /// task and returns immediately. The task's responses — usually one
    /// line, but `Null`-Inquire emits one `#BACKUP` per matching object —
    /// are written to the shared output as a contiguous block once `fut`
    /// resolves, so no other task's line can interleave mid-response.
    pub async fn submit<F>(&mut self, fut: F)
    where
        F: Future<Output = Vec<Response>> + Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("pool semaphore never closed");
        let writer = self.writer.clone();
        debug!("backint pool task submitted");
        self.tasks.spawn(async move {
            let responses = fut.await;
            let mut w = writer.lock().await;
            for response in &responses {
                if let Err(err) = w.write_all(response.to_line().as_bytes()).await {
                    tracing::error!(%err, "failed to write response line");
                    break;
                }
            }
            let _ = w.flush().await;
            drop(permit);
        });
    }

    /// Await every submitted task before returning: drain input, submit
    /// every task, then wait for the pool to go quiet.
    pub async fn drain(mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn respects_concurrency_bound() {
        let output: Vec<u8> = Vec::new();
        let mut pool = WorkerPool::new(2, output);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        for i in 0..6 {
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            pool.submit(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                vec![Response::Deleted {
                    ebid: format!("e{i}"),
                    path: "/tmp/a.dat".into(),
                }]
            })
            .await;
        }
        pool.drain().await;
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[derive(Clone, Default)]
    struct SharedVec(Arc<std::sync::Mutex<Vec<u8>>>);

    impl AsyncWrite for SharedVec {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.0.lock().expect("lock poisoned").extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn every_task_writes_exactly_one_line() {
        let output = SharedVec::default();
        let observe = output.clone();
        let mut pool = WorkerPool::new(4, output);
        for i in 0..5 {
            pool.submit(async move {
                vec![Response::Deleted {
                    ebid: format!("e{i}"),
                    path: "/tmp/a.dat".into(),
                }]
            })
            .await;
        }
        pool.drain().await;
        let written = observe.0.lock().unwrap();
        let text = String::from_utf8_lossy(&written);
        assert_eq!(text.lines().count(), 5);
        for line in text.lines() {
            assert!(line.starts_with("#DELETED "));
        }
    }
}
