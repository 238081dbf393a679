use crate::error::RelayError;
use crate::room::{Room, RoomCommand};
use crate::signaling::SignalingOutput;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use meshcall_core::utils::now_millis;
use meshcall_core::{MediaState, ParticipantId, ParticipantInfo, RoomId, SignalEnvelope};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

pub(crate) type RoomTable = Arc<DashMap<RoomId, mpsc::Sender<RoomCommand>>>;

const JOIN_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub participant: ParticipantInfo,
    /// Members present before the join, oldest first.
    pub members: Vec<ParticipantInfo>,
}

/// Authoritative room membership.
///
/// `memberships` answers "which room is this participant in" without touching
/// a room task; the member sets themselves live inside the room tasks.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: RoomTable,
    memberships: Arc<DashMap<ParticipantId, RoomId>>,
    signaling: Arc<dyn SignalingOutput>,
    room_capacity: usize,
}

impl RoomRegistry {
    pub fn new(signaling: Arc<dyn SignalingOutput>, room_capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            memberships: Arc::new(DashMap::new()),
            signaling,
            room_capacity: room_capacity.max(1),
        }
    }

    pub async fn join(
        &self,
        room_id: RoomId,
        participant_id: ParticipantId,
        display_name: String,
    ) -> Result<JoinOutcome, RelayError> {
        match self.memberships.entry(participant_id) {
            Entry::Occupied(current) => {
                return Err(RelayError::AlreadyJoined(
                    participant_id,
                    current.get().clone(),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(room_id.clone());
            }
        }

        let participant = ParticipantInfo {
            id: participant_id,
            room_id: room_id.clone(),
            display_name,
            joined_at_ms: now_millis(),
            media: MediaState::default(),
        };

        for attempt in 1..=JOIN_ATTEMPTS {
            let sender = self.get_or_create_room(&room_id);
            let (reply_tx, reply_rx) = oneshot::channel();
            let cmd = RoomCommand::Join {
                participant: participant.clone(),
                reply: reply_tx,
            };

            if sender.send(cmd).await.is_ok() {
                if let Ok(members) = reply_rx.await {
                    return Ok(JoinOutcome {
                        participant,
                        members,
                    });
                }
            }

            debug!(
                "Room '{}' closed while {} was joining (attempt {})",
                room_id, participant_id, attempt
            );
            self.forget_room(&room_id, &sender);
        }

        self.memberships.remove(&participant_id);
        Err(RelayError::RoomUnavailable(room_id))
    }

    /// Removes the participant from its room. Returns the room it left, or
    /// `None` when it was not in any room; calling it twice is harmless.
    pub async fn leave(&self, participant_id: ParticipantId) -> Option<RoomId> {
        let (_, room_id) = self.memberships.remove(&participant_id)?;

        let Some(sender) = self.room_sender(&room_id) else {
            warn!(
                "Room '{}' vanished before {} could leave it",
                room_id, participant_id
            );
            return Some(room_id);
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = RoomCommand::Leave {
            participant_id,
            reply: reply_tx,
        };
        if sender.send(cmd).await.is_err() {
            warn!("Room '{}' closed before {} left", room_id, participant_id);
            return Some(room_id);
        }

        match reply_rx.await {
            Ok(true) => {}
            Ok(false) => warn!(
                "Participant {} was indexed in room '{}' but not a member",
                participant_id, room_id
            ),
            Err(_) => warn!("Room '{}' dropped leave of {}", room_id, participant_id),
        }
        Some(room_id)
    }

    /// Transport went away without an explicit leave.
    pub async fn disconnect(&self, participant_id: ParticipantId) {
        if let Some(room_id) = self.leave(participant_id).await {
            info!(
                "Connection of {} closed, treated as leave of room '{}'",
                participant_id, room_id
            );
        }
    }

    /// Forwards an envelope within the sender's room, stamping its origin.
    pub async fn route(
        &self,
        from: ParticipantId,
        envelope: SignalEnvelope,
    ) -> Result<(), RelayError> {
        envelope.validate_client_submitted()?;

        let room_id = self.room_of(&from).ok_or(RelayError::NotInRoom(from))?;
        if envelope.room_id != room_id {
            return Err(RelayError::WrongRoom {
                addressed: envelope.room_id,
                member_of: room_id,
            });
        }

        self.send_to_room(
            &room_id,
            RoomCommand::Route {
                envelope: envelope.stamped(from),
            },
        )
        .await
    }

    pub async fn publish_media_state(
        &self,
        participant_id: ParticipantId,
        state: MediaState,
    ) -> Result<(), RelayError> {
        let room_id = self
            .room_of(&participant_id)
            .ok_or(RelayError::NotInRoom(participant_id))?;

        self.send_to_room(
            &room_id,
            RoomCommand::PublishMediaState {
                participant_id,
                state,
            },
        )
        .await
    }

    pub async fn members(&self, room_id: &RoomId) -> Vec<ParticipantInfo> {
        let Some(sender) = self.room_sender(room_id) else {
            return Vec::new();
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if sender
            .send(RoomCommand::Members { reply: reply_tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    pub fn room_of(&self, participant_id: &ParticipantId) -> Option<RoomId> {
        self.memberships
            .get(participant_id)
            .map(|entry| entry.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    async fn send_to_room(&self, room_id: &RoomId, cmd: RoomCommand) -> Result<(), RelayError> {
        let sender = self
            .room_sender(room_id)
            .ok_or_else(|| RelayError::RoomUnavailable(room_id.clone()))?;
        sender
            .send(cmd)
            .await
            .map_err(|_| RelayError::RoomUnavailable(room_id.clone()))
    }

    fn room_sender(&self, room_id: &RoomId) -> Option<mpsc::Sender<RoomCommand>> {
        self.rooms.get(room_id).map(|sender| sender.clone())
    }

    fn get_or_create_room(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        if let Some(sender) = self.room_sender(room_id) {
            return sender;
        }

        self.rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                info!("Creating new room: {}", room_id);
                let (tx, rx) = mpsc::channel(self.room_capacity);
                let room = Room::new(
                    room_id.clone(),
                    rx,
                    tx.downgrade(),
                    self.rooms.clone(),
                    self.signaling.clone(),
                );
                tokio::spawn(room.run());
                tx
            })
            .clone()
    }

    fn forget_room(&self, room_id: &RoomId, sender: &mpsc::Sender<RoomCommand>) {
        self.rooms
            .remove_if(room_id, |_, tx| tx.same_channel(sender));
    }
}
