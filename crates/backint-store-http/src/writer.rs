// SPDX-License-Identifier: MIT OR Apache-2.0
//! The streaming upload writer.
//!
//! Bytes handed to [`HttpWriter`] via `AsyncWrite` are forwarded over an
//! mpsc channel to a background task that drives the `PUT` request body
//! from a `Stream`. The object only becomes visible to `list`/`open_reader`
//! once the background task's response is awaited in `poll_shutdown`,
//! matching the "commit on close" semantics the ReadWriter relies on.

use bytes::Bytes;
use std::future::Future as _;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};

pub(crate) struct HttpWriter {
    tx: Option<mpsc::Sender<std::io::Result<Bytes>>>,
    result_rx: oneshot::Receiver<Result<(), std::io::Error>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl HttpWriter {
    pub(crate) fn new(
        tx: mpsc::Sender<std::io::Result<Bytes>>,
        result_rx: oneshot::Receiver<Result<(), std::io::Error>>,
        task: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            tx: Some(tx),
            result_rx,
            task: Some(task),
        }
    }
}

impl AsyncWrite for HttpWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let this = self.get_mut();
        let Some(tx) = this.tx.as_ref() else {
            return Poll::Ready(Err(std::io::Error::other("writer already shut down")));
        };
        match tx.try_reserve() {
            Ok(permit) => {
                permit.send(Ok(Bytes::copy_from_slice(buf)));
                Poll::Ready(Ok(buf.len()))
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let waker = cx.waker().clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx.reserve().await;
                    waker.wake();
                });
                Poll::Pending
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Poll::Ready(Err(std::io::Error::other("upload task ended early")))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        // Dropping the sender closes the body stream so the PUT can complete.
        this.tx.take();
        match Pin::new(&mut this.result_rx).poll(cx) {
            Poll::Ready(Ok(result)) => {
                if let Some(task) = this.task.take() {
                    task.abort();
                }
                Poll::Ready(result)
            }
            Poll::Ready(Err(_)) => Poll::Ready(Err(std::io::Error::other(
                "upload task dropped without a result",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
