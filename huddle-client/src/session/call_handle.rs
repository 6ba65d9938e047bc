use crate::media::LocalStream;
use crate::peer::PeerStatus;
use crate::session::session_command::SessionCommand;
use crate::session::session_event::SessionEvent;
use huddle_core::{CallError, Result, RoomId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Handle to a running call. Dropping it ends the call.
pub struct CallHandle {
    room: RoomId,
    stream: Arc<LocalStream>,
    commands: mpsc::Sender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl CallHandle {
    pub(crate) fn new(
        room: RoomId,
        stream: Arc<LocalStream>,
        commands: mpsc::Sender<SessionCommand>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        Self {
            room,
            stream,
            commands,
            events,
        }
    }

    /// Room identifier to share with the other participants.
    pub fn room_id(&self) -> &RoomId {
        &self.room
    }

    pub fn local_stream(&self) -> Arc<LocalStream> {
        Arc::clone(&self.stream)
    }

    pub async fn peers(&self) -> Result<Vec<PeerStatus>> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Peers { reply })
            .await
            .map_err(|_| CallError::SessionClosed)?;
        rx.await.map_err(|_| CallError::SessionClosed)
    }

    /// Next session event. `None` after [`SessionEvent::Ended`] was consumed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Close every peer connection, release the camera and microphone and
    /// leave the room. Returns once teardown is complete. Ending an already
    /// ended call does nothing.
    pub async fn end_call(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::End { reply }).await.is_err() {
            debug!("Call in room {} already ended", self.room);
            return Ok(());
        }
        let _ = rx.await;
        Ok(())
    }
}
