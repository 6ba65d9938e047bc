use crate::config::CallConfig;
use crate::directory::RoomDirectory;
use crate::media::{LocalStream, MediaSource};
use crate::peer::PeerManager;
use crate::session::call_handle::CallHandle;
use crate::session::call_session::CallSession;
use crate::signaling::{Publisher, SignalingChannel};
use crate::transport::TransportFactory;
use huddle_core::{PeerId, Result, RoomId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Entry point for placing and joining calls as one participant.
#[derive(Clone)]
pub struct CallClient {
    self_id: PeerId,
    config: CallConfig,
    directory: Arc<dyn RoomDirectory>,
    signaling: Arc<dyn SignalingChannel>,
    transports: Arc<dyn TransportFactory>,
    media: Arc<dyn MediaSource>,
}

impl CallClient {
    pub fn new(
        self_id: PeerId,
        config: CallConfig,
        directory: Arc<dyn RoomDirectory>,
        signaling: Arc<dyn SignalingChannel>,
        transports: Arc<dyn TransportFactory>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            self_id,
            config,
            directory,
            signaling,
            transports,
            media,
        }
    }

    pub fn self_id(&self) -> &PeerId {
        &self.self_id
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// Create a new room and enter it. Nothing is created if local media
    /// cannot be acquired.
    pub async fn start_call(&self) -> Result<CallHandle> {
        let stream = self.acquire_media().await?;

        let room = match self.directory.create_room().await {
            Ok(room) => room,
            Err(e) => {
                stream.release();
                return Err(e);
            }
        };
        info!("{:?} created room {}", self.self_id, room);

        self.enter(room, stream).await
    }

    pub async fn join_call(&self, room: &RoomId) -> Result<CallHandle> {
        let stream = self.acquire_media().await?;
        self.enter(room.clone(), stream).await
    }

    async fn acquire_media(&self) -> Result<Arc<LocalStream>> {
        match self.media.acquire(&self.config.media).await {
            Ok(stream) => Ok(Arc::new(stream)),
            Err(e) => {
                error!("{:?} cannot start a call: {}", self.self_id, e);
                Err(e)
            }
        }
    }

    async fn enter(&self, room: RoomId, stream: Arc<LocalStream>) -> Result<CallHandle> {
        // Nobody addresses us before we are listed, so whatever is waiting
        // belongs to an earlier visit.
        if let Err(e) = self.signaling.purge_to(&room, &self.self_id).await {
            warn!("Failed to clear old records in room {}: {}", room, e);
        }

        if let Err(e) = self.directory.join_room(&room, &self.self_id).await {
            warn!("{:?} failed to join room {}: {}", self.self_id, room, e);
            stream.release();
            return Err(e);
        }

        let watch = match self.directory.watch_participants(&room).await {
            Ok(watch) => watch,
            Err(e) => {
                warn!("Failed to watch room {}: {}", room, e);
                stream.release();
                let _ = self.directory.leave_room(&room, &self.self_id).await;
                return Err(e);
            }
        };

        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let publisher = Publisher::new(
            Arc::clone(&self.signaling),
            self.config.publish_retry.clone(),
        );
        let peers = PeerManager::new(
            self.self_id.clone(),
            room.clone(),
            self.config.clone(),
            publisher,
            Arc::clone(&self.transports),
            Arc::clone(&stream),
            event_tx.clone(),
        );

        let session = CallSession::new(
            self.self_id.clone(),
            room.clone(),
            Arc::clone(&self.directory),
            Arc::clone(&self.signaling),
            Arc::clone(&stream),
            peers,
            watch,
            command_rx,
            event_tx,
        );
        tokio::spawn(session.run());

        info!("{:?} joined room {}", self.self_id, room);
        Ok(CallHandle::new(room, stream, command_tx, event_rx))
    }
}
