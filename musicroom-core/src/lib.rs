//! Domain logic for musicroom: typed identifiers, the ordered room queue,
//! and the playback state machine that decides how a room's current track evolves.

mod id;

pub mod playback;
pub mod queue;

pub use id::*;
pub use playback::{
    Advance, CurrentTrack, Playback, PlaybackError, PlaybackState, Transition,
};
pub use queue::{next_order, Order, OrderedQueue, QueueEntry};
