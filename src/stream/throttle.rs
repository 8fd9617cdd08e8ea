//! Stream throttling utilities

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep_until};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Throttle the stream to emit at most once per interval
    ///
    /// Uses "latest-wins" semantics - if multiple items arrive
    /// during an interval, only the latest is emitted. The last item
    /// before the inner stream ends is always emitted.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        // Created on the first emission, so construction needs no runtime
        window: Option<Pin<Box<Sleep>>>,
        duration: Duration,
        pending: Option<S::Item>,
        done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    /// Create a new throttled stream. Polling requires a tokio runtime with
    /// the time driver enabled.
    pub fn new(stream: S, duration: Duration) -> Self {
        Self { stream, window: None, duration, pending: None, done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything available, keeping only the latest
        while !*this.done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => break,
            }
        }

        if *this.done {
            return Poll::Ready(this.pending.take());
        }
        if this.pending.is_none() {
            return Poll::Pending;
        }

        let deadline = Instant::now() + *this.duration;
        if let Some(window) = this.window.as_mut() {
            if window.as_mut().poll(cx).is_pending() {
                return Poll::Pending;
            }
            window.as_mut().reset(deadline);
        } else {
            // The first item is not delayed
            *this.window = Some(Box::pin(sleep_until(deadline)));
        }
        Poll::Ready(this.pending.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::sync::watch;
    use tokio_stream::wrappers::WatchStream;

    #[tokio::test(start_paused = true)]
    async fn emits_latest_once_per_window() {
        let (tx, rx) = watch::channel(0u32);
        let throttled = WatchStream::from_changes(rx).throttle(Duration::from_millis(100));
        let mut stream = Box::pin(throttled);

        tx.send(1).unwrap();
        assert_eq!(stream.next().await, Some(1));

        tx.send(2).unwrap();
        tx.send(3).unwrap();
        let before = Instant::now();
        assert_eq!(stream.next().await, Some(3));
        assert!(before.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_last_item_when_inner_ends() {
        let inner = futures::stream::iter(vec![1, 2, 3]);
        let items: Vec<i32> = inner.throttle(Duration::from_secs(1)).collect().await;
        assert_eq!(items, vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_instead_of_ending_when_idle() {
        let (tx, rx) = watch::channel(0u32);
        let throttled = WatchStream::from_changes(rx).throttle(Duration::from_millis(10));
        let mut stream = Box::pin(throttled);

        let sender = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            tx.send(7).unwrap();
            tx
        });

        assert_eq!(stream.next().await, Some(7));
        drop(sender.await.unwrap());
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn builds_outside_a_runtime() {
        let throttled = futures::stream::iter(vec![1u8]).throttle(Duration::from_millis(10));
        drop(throttled);
    }
}
