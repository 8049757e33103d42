//! AsyncProviderManager.

use tracing::{debug_span, Instrument};

use crate::common::ProviderInfo;
use crate::manager::{get_message, ActorMessage, ProviderManager};
use crate::Error;

impl ProviderManager {
    /// Return an async version of the provider manager.
    pub fn as_async(self) -> AsyncProviderManager {
        AsyncProviderManager(self)
    }
}

#[derive(Debug, Clone)]
/// Async version of the [ProviderManager].
///
/// Dropping a returned future before it resolves cancels the caller's wait.
/// A request the worker already accepted is still processed.
pub struct AsyncProviderManager(ProviderManager);

impl AsyncProviderManager {
    /// Records `provider` as a provider of `key`.
    ///
    /// See [ProviderManager::add_provider].
    pub async fn add_provider(&self, key: &[u8], provider: ProviderInfo) -> Result<(), Error> {
        let span = debug_span!("add_provider", peer = %provider.peer_id);

        let message = span.in_scope(|| self.0.add_message(key, provider));

        self.0
            .sender
            .send_async(message)
            .instrument(span)
            .await
            .map_err(|_| Error::Shutdown)
    }

    /// Returns the unexpired providers of `key`.
    ///
    /// See [ProviderManager::get_providers].
    pub async fn get_providers(&self, key: &[u8]) -> Result<Vec<ProviderInfo>, Error> {
        let (message, receiver) = get_message(key);

        async {
            self.0
                .sender
                .send_async(message)
                .await
                .map_err(|_| Error::Shutdown)?;

            let peers = receiver.recv_async().await.map_err(|_| Error::Shutdown)?;

            Ok(self.0.address_book().provider_infos(&peers))
        }
        .instrument(debug_span!("get_providers"))
        .await
    }

    /// Stops the worker and waits until it has flushed buffered writes.
    pub async fn close(&self) -> Result<(), Error> {
        let (sender, receiver) = flume::bounded::<()>(1);

        self.0
            .sender
            .send_async(ActorMessage::Shutdown(sender))
            .await
            .map_err(|_| Error::Shutdown)?;

        receiver.recv_async().await.map_err(|_| Error::Shutdown)
    }

    /// Returns the blocking version of this manager.
    pub fn as_blocking(&self) -> &ProviderManager {
        &self.0
    }
}
