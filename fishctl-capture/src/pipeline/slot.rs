use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Outcome of waiting on a [`FrameSlot`]
#[derive(Debug, PartialEq, Eq)]
pub enum Take<T> {
    Item(T),
    Timeout,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotStats {
    pub offered: u64,
    pub delivered: u64,
    /// Items replaced before the consumer got to them
    pub dropped: u64,
}

struct SlotState<T> {
    item: Option<T>,
    closed: bool,
    stats: SlotStats,
}

/// Single-slot, latest-wins handoff between a producer thread and a consumer.
///
/// `offer` never waits for the consumer: a new item replaces whatever is still
/// undelivered. `take` blocks until an item arrives, the timeout passes, or the
/// slot is closed.
pub struct FrameSlot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                item: None,
                closed: false,
                stats: SlotStats::default(),
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Put `item` in the slot, displacing any undelivered one.
    ///
    /// Returns false (and discards the item) once the slot is closed.
    pub fn offer(&self, item: T) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.stats.offered += 1;
        if state.item.replace(item).is_some() {
            state.stats.dropped += 1;
        }
        drop(state);
        self.ready.notify_one();
        true
    }

    pub fn take(&self, timeout: Duration) -> Take<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(item) = state.item.take() {
                state.stats.delivered += 1;
                return Take::Item(item);
            }
            if state.closed {
                return Take::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                return Take::Timeout;
            }
            let (guard, _) = self
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = guard;
        }
    }

    /// Discard any pending item and wake every waiter; later offers are refused
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        if state.item.take().is_some() {
            state.stats.dropped += 1;
        }
        drop(state);
        self.ready.notify_all();
    }

    pub fn stats(&self) -> SlotStats {
        self.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_times_out_when_empty() {
        let slot: FrameSlot<u32> = FrameSlot::new();
        assert_eq!(slot.take(Duration::from_millis(5)), Take::Timeout);
    }

    #[test]
    fn newer_offer_replaces_undelivered_item() {
        let slot = FrameSlot::new();
        assert!(slot.offer(1));
        assert!(slot.offer(2));
        assert_eq!(slot.take(Duration::ZERO), Take::Item(2));
        assert_eq!(slot.take(Duration::ZERO), Take::Timeout);
        assert_eq!(
            slot.stats(),
            SlotStats {
                offered: 2,
                delivered: 1,
                dropped: 1
            }
        );
    }

    #[test]
    fn close_drains_and_refuses_offers() {
        let slot = FrameSlot::new();
        slot.offer("pending");
        slot.close();
        slot.close();
        assert!(!slot.offer("late"));
        assert_eq!(slot.take(Duration::from_secs(1)), Take::Closed);
    }
}
