use std::sync::Arc;

use tokio::sync::watch;

use super::super::gateway::JobGateway;
use super::super::store::{PipelineStore, StoreSnapshot, Subscription};

/// A projection that re-derives itself from the store on every change.
///
/// Holds the latest value in a watch channel; dropping the projection
/// unsubscribes it.
pub struct LiveProjection<T> {
    receiver: watch::Receiver<T>,
    _subscription: Subscription,
}

impl<T> LiveProjection<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn spawn<G, F>(store: &PipelineStore<G>, derive: F) -> Self
    where
        G: JobGateway,
        F: Fn(&StoreSnapshot) -> T + Send + Sync + 'static,
    {
        let derive = Arc::new(derive);
        let (sender, mut receiver) = watch::channel((*derive)(&store.snapshot()));
        let sender = Arc::new(sender);

        let subscription = {
            let source = store.clone();
            let derive = Arc::clone(&derive);
            let sender = Arc::clone(&sender);
            store.on_change(move |_event| {
                sender.send_replace((*derive)(&source.snapshot()));
            })
        };
        // Catch anything that landed between the first snapshot and subscribing.
        sender.send_replace((*derive)(&store.snapshot()));
        receiver.borrow_and_update();

        Self {
            receiver,
            _subscription: subscription,
        }
    }

    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Waits for the next re-derivation and returns it.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
