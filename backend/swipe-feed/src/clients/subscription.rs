use crate::models::ContentRecord;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

type Teardown = Box<dyn FnOnce() + Send + Sync>;

/// Stream of content snapshots for one query.
///
/// The first item is the snapshot current at subscribe time. The stream ends
/// when the publisher goes away. Teardown runs exactly once, on
/// [`ContentSubscription::unsubscribe`] or on drop.
pub struct ContentSubscription {
    stream: WatchStream<Vec<ContentRecord>>,
    teardown: Option<Teardown>,
}

impl ContentSubscription {
    pub fn new<F>(receiver: watch::Receiver<Vec<ContentRecord>>, teardown: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            stream: WatchStream::new(receiver),
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.run_teardown();
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Stream for ContentSubscription {
    type Item = Vec<ContentRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().stream).poll_next(cx)
    }
}

impl Drop for ContentSubscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl std::fmt::Debug for ContentSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSubscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}
