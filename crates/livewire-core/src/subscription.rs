// ── Stream subscriptions ──
//
// `Stream` view over a listener registry, for consumers that would
// rather `.next().await` than pass a callback. Each subscription is an
// ordinary listener feeding an unbounded channel; dropping the
// subscription unregisters it.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::listeners::{ListenerId, Registry};

/// Events of one type, as a `Stream`.
///
/// Ends when the client is stopped, since stopping clears the registry
/// and with it the sending half.
pub struct EventSubscription<T: Clone + Send + 'static> {
    inner: UnboundedReceiverStream<T>,
    registry: Weak<Registry<T>>,
    id: ListenerId,
}

impl<T: Clone + Send + 'static> EventSubscription<T> {
    pub(crate) fn attach(registry: &Arc<Registry<T>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.register(move |event: &T| {
            // Receiver gone means the subscription is mid-drop.
            let _ = tx.send(event.clone());
        });
        Self {
            inner: UnboundedReceiverStream::new(rx),
            registry: Arc::downgrade(registry),
            id,
        }
    }
}

impl<T: Clone + Send + 'static> Stream for EventSubscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // UnboundedReceiverStream is Unpin.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T: Clone + Send + 'static> Drop for EventSubscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}
