//! Room orchestration for musicroom: storage, membership, queues, playback and chat.

mod db;
mod events;
mod password;
mod rooms;
mod tracks;

use std::sync::Arc;

pub use db::*;
pub use events::*;
pub use password::*;
pub use rooms::*;
pub use tracks::*;

/// The musicroom collab system, facilitating room management, playback, and chat.
pub struct Collab {
    pub rooms: RoomService,
    pub tracks: TrackService,

    events: EventReceiver,
}

/// Settings the collab system is created with
#[derive(Debug, Clone, Copy)]
pub struct CollabConfig {
    /// Used when a room is created without a member limit
    pub default_max_members: i32,
}

/// A type passed to various components of the collab system, to access state and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub database: Arc<dyn Database>,
    pub config: CollabConfig,
    pub locks: RoomLocks,

    events: EventSender,
}

impl Collab {
    pub fn new(database: Arc<dyn Database>, config: CollabConfig) -> Self {
        let (sender, receiver) = event_channel();

        let context = CollabContext {
            database,
            config,
            locks: Default::default(),
            events: sender,
        };

        Self {
            rooms: RoomService::new(&context),
            tracks: TrackService::new(&context),
            events: receiver,
        }
    }

    /// Returns the receiving end of the event channel.
    /// Each event is delivered to exactly one of the receivers.
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }
}

impl CollabContext {
    pub fn emit(&self, event: CollabEvent) {
        // Collab keeps a receiver alive, so sending cannot fail while the context exists
        let _ = self.events.send(event);
    }
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            default_max_members: 50,
        }
    }
}
