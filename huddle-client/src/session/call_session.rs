use crate::directory::{ParticipantWatch, RoomDirectory};
use crate::media::LocalStream;
use crate::peer::{PeerManager, Role};
use crate::session::session_command::SessionCommand;
use crate::session::session_event::SessionEvent;
use crate::signaling::{SignalInbox, SignalingChannel};
use huddle_core::{Participants, PeerId, RoomId, SignalMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Task driving one participant's side of a call: follows the room
/// membership, routes signaling to the peer links and tears everything down
/// when the call ends.
pub(crate) struct CallSession {
    self_id: PeerId,
    room: RoomId,
    directory: Arc<dyn RoomDirectory>,
    signaling: Arc<dyn SignalingChannel>,
    stream: Arc<LocalStream>,
    peers: PeerManager,
    watch: Option<ParticipantWatch>,
    inbox: Option<SignalInbox>,
    command_rx: mpsc::Receiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl CallSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        self_id: PeerId,
        room: RoomId,
        directory: Arc<dyn RoomDirectory>,
        signaling: Arc<dyn SignalingChannel>,
        stream: Arc<LocalStream>,
        peers: PeerManager,
        watch: ParticipantWatch,
        command_rx: mpsc::Receiver<SessionCommand>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            self_id,
            room,
            directory,
            signaling,
            stream,
            peers,
            watch: Some(watch),
            inbox: None,
            command_rx,
            events,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Call session for {:?} in room {} started", self.self_id, self.room);

        // Links have to exist before the first signaling message is routed.
        let first = match self.watch.as_mut() {
            Some(watch) => watch.next().await,
            None => None,
        };
        match first {
            Some(snapshot) => self.handle_snapshot(snapshot).await,
            None => {
                warn!("Participant feed for room {} closed immediately", self.room);
                self.watch = None;
            }
        }

        match SignalInbox::open(self.signaling.as_ref(), &self.room, &self.self_id).await {
            Ok(inbox) => self.inbox = Some(inbox),
            Err(e) => error!("Failed to subscribe to signaling in room {}: {}", self.room, e),
        }

        let mut end_reply: Option<oneshot::Sender<()>> = None;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Peers { reply }) => {
                            let _ = reply.send(self.peers.statuses());
                        }
                        Some(SessionCommand::End { reply }) => {
                            info!("Ending call in room {}", self.room);
                            end_reply = Some(reply);
                            break;
                        }
                        None => {
                            info!("Call handle dropped. Ending call in room {}", self.room);
                            break;
                        }
                    }
                }

                snapshot = next_snapshot(&mut self.watch) => {
                    match snapshot {
                        Some(s) => self.handle_snapshot(s).await,
                        None => {
                            warn!("Participant feed for room {} closed", self.room);
                            self.watch = None;
                        }
                    }
                }

                message = next_signal(&mut self.inbox) => {
                    match message {
                        Some(m) => self.handle_signal(m).await,
                        None => {
                            warn!("Signaling feed for room {} closed", self.room);
                            self.inbox = None;
                        }
                    }
                }

                input = self.peers.next_input() => {
                    self.peers.handle_input(input).await;
                }
            }
        }

        self.teardown().await;

        if let Some(reply) = end_reply {
            let _ = reply.send(());
        }
    }

    async fn handle_snapshot(&mut self, participants: Participants) {
        debug!(
            "Room {} now has {} participant(s)",
            self.room,
            participants.len()
        );

        for peer_id in self.peers.tracked() {
            if !participants.contains(&peer_id) {
                info!("{:?} left room {}", peer_id, self.room);
                self.peers.close(&peer_id).await;
            }
        }

        if participants.contains(&self.self_id) {
            for peer_id in participants.iter() {
                if *peer_id == self.self_id || self.peers.contains(peer_id) {
                    continue;
                }
                // The earlier joiner offers, the later one answers.
                let role = if participants.joined_before(&self.self_id, peer_id) {
                    Role::Initiator
                } else {
                    Role::Responder
                };
                self.peers.open(peer_id.clone(), role).await;
            }
        } else {
            warn!(
                "{:?} is missing from the room {} snapshot, not opening links",
                self.self_id, self.room
            );
        }

        let _ = self.events.send(SessionEvent::ParticipantsChanged(participants));
    }

    async fn handle_signal(&mut self, message: SignalMessage) {
        let id = message.id;
        self.peers.handle_signal(message).await;

        if let Err(e) = self.signaling.acknowledge(&self.room, id).await {
            warn!("Failed to acknowledge message {}: {}", id, e);
        }
    }

    async fn teardown(&mut self) {
        self.peers.close_all().await;

        if self.stream.release() {
            debug!("Released local stream {}", self.stream.id());
        }

        if let Err(e) = self.directory.leave_room(&self.room, &self.self_id).await {
            warn!("Failed to leave room {}: {}", self.room, e);
        }

        if let Err(e) = self.signaling.purge_from(&self.room, &self.self_id).await {
            warn!("Failed to purge signaling records in room {}: {}", self.room, e);
        }

        let _ = self.events.send(SessionEvent::Ended);
        info!("Call session for {:?} in room {} finished", self.self_id, self.room);
    }
}

async fn next_snapshot(watch: &mut Option<ParticipantWatch>) -> Option<Participants> {
    match watch {
        Some(w) => w.next().await,
        None => std::future::pending().await,
    }
}

async fn next_signal(inbox: &mut Option<SignalInbox>) -> Option<SignalMessage> {
    match inbox {
        Some(i) => i.recv().await,
        None => std::future::pending().await,
    }
}
