use crate::media::LocalStream;
use crate::transport::transport_event::{LinkKey, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use huddle_core::IceCandidate;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One real-time media connection to a remote participant.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Create an offer and install it as the local description.
    async fn create_offer(&self) -> Result<String>;

    /// Create an answer and install it as the local description.
    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_offer(&self, sdp: String) -> Result<()>;

    async fn set_remote_answer(&self, sdp: String) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds transports. Every transport reports through `events`, tagged with
/// the `key` it was created for.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        key: LinkKey,
        stream: Arc<LocalStream>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>>;
}
