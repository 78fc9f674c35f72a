
use crate::{EntryId, TrackId};

/// Position of an entry within a room's queue.
/// Unique per room and assigned monotonically, gaps are left behind on removal.
pub type Order = i32;

/// A queued track as seen by the playback state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: EntryId,
    pub track_id: TrackId,
    pub order: Order,
}

/// A room's queue, sorted by ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedQueue {
    entries: Vec<QueueEntry>,
}

impl OrderedQueue {
    pub fn new(mut entries: Vec<QueueEntry>) -> Self {
        entries.sort_by_key(|e| e.order);
        Self { entries }
    }

    /// The entry with the lowest order, which is the next to play.
    pub fn head(&self) -> Option<&QueueEntry> {
        self.entries.first()
    }

    pub fn get(&self, entry_id: EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    pub fn contains(&self, entry_id: EntryId) -> bool {
        self.get(entry_id).is_some()
    }

    /// Returns the head of the queue as it would be after removing `entry_id`.
    pub fn head_without(&self, entry_id: EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id != entry_id)
    }

    /// The highest order in the queue, or 0 if it is empty.
    pub fn max_order(&self) -> Order {
        self.entries.last().map(|e| e.order).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }
}

impl FromIterator<QueueEntry> for OrderedQueue {
    fn from_iter<T: IntoIterator<Item = QueueEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The order a newly enqueued entry receives, given the highest order currently in the room.
pub fn next_order(max_order: Order) -> Order {
    max_order.max(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: EntryId, order: Order) -> QueueEntry {
        QueueEntry {
            id,
            track_id: id * 10,
            order,
        }
    }

    #[test]
    fn sorts_by_order() {
        let queue = OrderedQueue::new(vec![entry(3, 7), entry(1, 2), entry(2, 5)]);
        let ids: Vec<_> = queue.iter().map(|e| e.id).collect();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(queue.head().map(|e| e.id), Some(1));
        assert_eq!(queue.max_order(), 7);
    }

    #[test]
    fn head_without_skips_the_given_entry() {
        let queue = OrderedQueue::new(vec![entry(1, 1), entry(2, 2)]);

        assert_eq!(queue.head_without(1).map(|e| e.id), Some(2));
        assert_eq!(queue.head_without(2).map(|e| e.id), Some(1));
        assert_eq!(OrderedQueue::new(vec![entry(1, 1)]).head_without(1), None);
    }

    #[test]
    fn next_order_follows_the_maximum() {
        assert_eq!(next_order(0), 1);
        assert_eq!(next_order(OrderedQueue::default().max_order()), 1);

        // Gaps are not filled in
        let queue = OrderedQueue::new(vec![entry(1, 1), entry(4, 4)]);
        assert_eq!(next_order(queue.max_order()), 5);
    }
}
