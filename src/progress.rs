use bytes::Bytes;
use futures_util::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Receives transfer notifications as body bytes move through a pipeline.
///
/// `total` is the expected byte count when the transfer advertised one
/// (`Content-Length`), and `percent` is `transferred` against that total,
/// or `0.0` when the total is unknown. Implemented for any
/// `FnMut(u64, Option<u64>, f64)` closure; `()` is the no-op observer.
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, transferred: u64, total: Option<u64>, percent: f64);
}

impl<F> ProgressObserver for F
where
    F: FnMut(u64, Option<u64>, f64) + Send,
{
    fn on_progress(&mut self, transferred: u64, total: Option<u64>, percent: f64) {
        self(transferred, total, percent)
    }
}

impl ProgressObserver for () {
    fn on_progress(&mut self, _: u64, _: Option<u64>, _: f64) {}
}

/// Pass-through stream adapter that reports cumulative progress.
///
/// Every chunk is forwarded unchanged and counted; nothing is buffered and
/// nothing is reordered. When a total is known, the reported count is
/// clamped to it, so `transferred` never overshoots what the caller
/// advertised.
pub struct ProgressStream<S, P> {
    stream: S,
    observer: P,
    transferred: u64,
    total: Option<u64>,
}

impl<S, P> ProgressStream<S, P> {
    pub fn new(stream: S, total: Option<u64>, observer: P) -> ProgressStream<S, P> {
        ProgressStream {
            stream,
            observer,
            transferred: 0,
            total,
        }
    }
}

impl<S, E, P> Stream for ProgressStream<S, P>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    P: ProgressObserver + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match Pin::new(&mut this.stream).poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                this.transferred += bytes.len() as u64;

                let transferred = match this.total {
                    Some(total) => this.transferred.min(total),
                    None => this.transferred,
                };
                let percent = match this.total {
                    Some(total) if total > 0 => transferred as f64 * 100.0 / total as f64,
                    _ => 0.0,
                };

                this.observer.on_progress(transferred, this.total, percent);

                Poll::Ready(Some(Ok(bytes)))
            }
            other => other,
        }
    }
}
