use crate::error::RelayError;
use crate::room::room_command::RoomCommand;
use crate::room::room_registry::RoomTable;
use crate::signaling::SignalingOutput;
use meshcall_core::{
    MediaState, ParticipantId, ParticipantInfo, RoomId, ServerMessage, SignalEnvelope,
    SignalPayload,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Event loop owning the membership of one room.
///
/// Every mutation of the member set goes through `command_rx`, so joins and
/// leaves for the same room never interleave. Separate rooms run as separate
/// tasks.
pub struct Room {
    room_id: RoomId,
    members: HashMap<ParticipantId, ParticipantInfo>,
    command_rx: mpsc::Receiver<RoomCommand>,
    /// Used to recognise our own entry in `rooms` when retiring.
    self_tx: mpsc::WeakSender<RoomCommand>,
    rooms: RoomTable,
    signaling: Arc<dyn SignalingOutput>,
}

impl Room {
    pub(crate) fn new(
        room_id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        self_tx: mpsc::WeakSender<RoomCommand>,
        rooms: RoomTable,
        signaling: Arc<dyn SignalingOutput>,
    ) -> Self {
        Self {
            room_id,
            members: HashMap::new(),
            command_rx,
            self_tx,
            rooms,
            signaling,
        }
    }

    pub async fn run(mut self) {
        info!("Room '{}' event loop started", self.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            let emptied = self.handle_command(cmd).await;
            if emptied {
                self.retire();
                break;
            }
        }

        // Commands still queued are dropped with the receiver; pending joins
        // see their reply channel close and retry against a fresh room.
        info!("Room '{}' event loop finished", self.room_id);
    }

    async fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        match cmd {
            RoomCommand::Join { participant, reply } => {
                let existing = self.join(participant).await;
                let _ = reply.send(existing);
                false
            }

            RoomCommand::Leave {
                participant_id,
                reply,
            } => {
                let removed = self.leave(&participant_id).await;
                let _ = reply.send(removed);
                self.members.is_empty()
            }

            RoomCommand::Route { envelope } => {
                self.route(envelope).await;
                false
            }

            RoomCommand::PublishMediaState {
                participant_id,
                state,
            } => {
                self.publish_media_state(participant_id, state).await;
                false
            }

            RoomCommand::Members { reply } => {
                let _ = reply.send(self.sorted_members(None));
                false
            }
        }
    }

    async fn join(&mut self, participant: ParticipantInfo) -> Vec<ParticipantInfo> {
        let joiner = participant.id;
        let existing = self.sorted_members(Some(&joiner));

        if self.members.insert(joiner, participant.clone()).is_some() {
            warn!("Participant {} re-joined room '{}'", joiner, self.room_id);
        }
        info!(
            "Participant {} ({}) joined room '{}', {} member(s) now",
            joiner,
            participant.display_name,
            self.room_id,
            self.members.len()
        );

        // The joiner hears about the room before any signal from its members.
        self.signaling
            .send(
                &joiner,
                ServerMessage::Joined {
                    room_id: self.room_id.clone(),
                    participant_id: joiner,
                    members: existing.clone(),
                },
            )
            .await;

        let notify = SignalEnvelope::room_wide(
            self.room_id.clone(),
            SignalPayload::Join {
                display_name: participant.display_name,
            },
        )
        .stamped(joiner);
        self.broadcast(&joiner, ServerMessage::Signal(notify)).await;

        existing
    }

    async fn leave(&mut self, participant_id: &ParticipantId) -> bool {
        let Some(left) = self.members.remove(participant_id) else {
            return false;
        };

        info!(
            "Participant {} ({}) left room '{}', {} member(s) remain",
            left.id,
            left.display_name,
            self.room_id,
            self.members.len()
        );

        let notify =
            SignalEnvelope::room_wide(self.room_id.clone(), SignalPayload::Leave).stamped(left.id);
        self.broadcast(participant_id, ServerMessage::Signal(notify))
            .await;
        true
    }

    async fn route(&self, envelope: SignalEnvelope) {
        let Some(from) = envelope.from_id else {
            warn!("Unstamped {} envelope in room '{}'", envelope.kind(), self.room_id);
            return;
        };
        if !self.members.contains_key(&from) {
            warn!(
                "Dropping {} from {}: not a member of room '{}'",
                envelope.kind(),
                from,
                self.room_id
            );
            return;
        }

        match envelope.to_id {
            Some(target) => {
                if target == from || !self.members.contains_key(&target) {
                    let err = RelayError::UnknownTarget {
                        room_id: self.room_id.clone(),
                        target,
                    };
                    warn!("Dropping {} from {}: {}", envelope.kind(), from, err);
                    return;
                }
                debug!("Routing {} {} -> {}", envelope.kind(), from, target);
                self.signaling
                    .send(&target, ServerMessage::Signal(envelope))
                    .await;
            }
            None => {
                debug!("Broadcasting {} from {}", envelope.kind(), from);
                self.broadcast(&from, ServerMessage::Signal(envelope)).await;
            }
        }
    }

    async fn publish_media_state(&mut self, participant_id: ParticipantId, state: MediaState) {
        let Some(member) = self.members.get_mut(&participant_id) else {
            warn!(
                "Media state from {} ignored: not a member of room '{}'",
                participant_id, self.room_id
            );
            return;
        };
        member.media = state;

        self.broadcast(
            &participant_id,
            ServerMessage::MediaStateChanged {
                participant_id,
                state,
            },
        )
        .await;
    }

    async fn broadcast(&self, except: &ParticipantId, message: ServerMessage) {
        for id in self.members.keys().filter(|id| *id != except) {
            self.signaling.send(id, message.clone()).await;
        }
    }

    fn sorted_members(&self, except: Option<&ParticipantId>) -> Vec<ParticipantInfo> {
        let mut members: Vec<ParticipantInfo> = self
            .members
            .values()
            .filter(|m| Some(&m.id) != except)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at_ms.cmp(&b.joined_at_ms).then(a.id.cmp(&b.id)));
        members
    }

    fn retire(&self) {
        let Some(me) = self.self_tx.upgrade() else {
            return;
        };
        if self
            .rooms
            .remove_if(&self.room_id, |_, tx| tx.same_channel(&me))
            .is_some()
        {
            info!("Room '{}' is empty, closing", self.room_id);
        }
    }
}
