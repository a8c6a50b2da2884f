//! Virtual-time timer queue
//!
//! Timers fire in deadline order, ties in scheduling order. Time only moves
//! when the owner pops due entries, so the same queue serves a real clock
//! loop and synchronous tests.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    id: TimerId,
    deadline_ms: u64,
    seq: u64,
    interval_ms: Option<u64>,
    payload: T,
}

#[derive(Debug)]
pub struct TimerQueue<T> {
    now_ms: u64,
    next_id: u64,
    next_seq: u64,
    entries: Vec<Entry<T>>,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            next_id: 0,
            next_seq: 0,
            entries: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn schedule_once(&mut self, delay_ms: u64, payload: T) -> TimerId {
        self.insert(delay_ms, None, payload)
    }

    /// Fire every `interval_ms` until cancelled
    pub fn schedule_repeating(&mut self, interval_ms: u64, payload: T) -> TimerId {
        let interval_ms = interval_ms.max(1);
        self.insert(interval_ms, Some(interval_ms), payload)
    }

    fn insert(&mut self, delay_ms: u64, interval_ms: Option<u64>, payload: T) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let seq = self.bump_seq();
        self.entries.push(Entry {
            id,
            deadline_ms: self.now_ms + delay_ms,
            seq,
            interval_ms,
            payload,
        });
        id
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Cancel the timer in `slot`, if any, leaving the slot empty
    pub fn cancel_slot(&mut self, slot: &mut Option<TimerId>) {
        if let Some(id) = slot.take() {
            self.cancel(id);
        }
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.deadline_ms).min()
    }

    /// Pop the earliest timer due at or before `until_ms`, moving the clock to its deadline
    ///
    /// Repeating timers are rescheduled before being returned, so the caller may cancel
    /// them while handling the payload.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerId, T)> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline_ms <= until_ms)
            .min_by_key(|(_, e)| (e.deadline_ms, e.seq))
            .map(|(i, _)| i)?;

        let deadline = self.entries[index].deadline_ms;
        self.now_ms = self.now_ms.max(deadline);

        match self.entries[index].interval_ms {
            Some(interval) => {
                let seq = self.bump_seq();
                let entry = &mut self.entries[index];
                entry.deadline_ms += interval;
                entry.seq = seq;
                Some((entry.id, entry.payload.clone()))
            }
            None => {
                let entry = self.entries.swap_remove(index);
                Some((entry.id, entry.payload))
            }
        }
    }

    /// Move the clock forward without firing anything
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TimerQueue<&'static str>, until: u64) -> Vec<(u64, &'static str)> {
        let mut fired = Vec::new();
        while let Some((_, payload)) = queue.pop_due(until) {
            fired.push((queue.now_ms(), payload));
        }
        queue.set_now(until);
        fired
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_once(300, "c");
        queue.schedule_once(100, "a");
        queue.schedule_once(200, "b");

        assert_eq!(drain(&mut queue, 1000), vec![(100, "a"), (200, "b"), (300, "c")]);
        assert!(queue.is_empty());
        assert_eq!(queue.now_ms(), 1000);
    }

    #[test]
    fn test_ties_fire_in_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_once(100, "first");
        queue.schedule_once(100, "second");
        assert_eq!(drain(&mut queue, 100), vec![(100, "first"), (100, "second")]);
    }

    #[test]
    fn test_not_due_stays_queued() {
        let mut queue = TimerQueue::new();
        queue.schedule_once(500, "later");
        assert!(drain(&mut queue, 499).is_empty());
        assert_eq!(queue.next_deadline(), Some(500));
        assert_eq!(drain(&mut queue, 500), vec![(500, "later")]);
    }

    #[test]
    fn test_delay_is_relative_to_now() {
        let mut queue = TimerQueue::new();
        queue.set_now(1000);
        queue.schedule_once(50, "x");
        assert_eq!(queue.next_deadline(), Some(1050));
    }

    #[test]
    fn test_repeating_until_cancelled() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule_repeating(50, "tick");
        queue.schedule_once(120, "once");

        let fired = drain(&mut queue, 160);
        assert_eq!(
            fired,
            vec![(50, "tick"), (100, "tick"), (120, "once"), (150, "tick")]
        );

        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(drain(&mut queue, 1000).is_empty());
    }

    #[test]
    fn test_cancel_slot() {
        let mut queue = TimerQueue::new();
        let mut slot = Some(queue.schedule_once(10, "x"));
        queue.cancel_slot(&mut slot);
        assert!(slot.is_none());
        assert!(queue.is_empty());
        queue.cancel_slot(&mut slot);
    }
}
