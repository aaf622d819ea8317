use std::collections::{BTreeMap, HashMap};

/// Handle returned by [`TimerQueue::schedule`]; pass it back to `cancel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelToken(u64);

/// Virtual-time timer queue for the single-threaded animation loop.
///
/// Nothing fires on its own: the owner calls [`TimerQueue::pop_due`] with the
/// current time and dispatches each returned event. Timers due at the same
/// millisecond come out in the order they were scheduled.
#[derive(Debug)]
pub struct TimerQueue<E> {
    next_id: u64,
    entries: BTreeMap<(i64, u64), E>,
    due_by_id: HashMap<u64, i64>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
            due_by_id: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, now: i64, delay_ms: i64, event: E) -> CancelToken {
        let id = self.next_id;
        self.next_id += 1;

        let due = now + delay_ms.max(0);
        self.entries.insert((due, id), event);
        self.due_by_id.insert(id, due);
        CancelToken(id)
    }

    /// Returns false when the timer already fired or was cancelled.
    pub fn cancel(&mut self, token: CancelToken) -> bool {
        match self.due_by_id.remove(&token.0) {
            Some(due) => self.entries.remove(&(due, token.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, token: CancelToken) -> bool {
        self.due_by_id.contains_key(&token.0)
    }

    pub fn pop_due(&mut self, now: i64) -> Option<(i64, E)> {
        let key = *self.entries.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.due_by_id.remove(&key.1);
        self.entries.remove(&key).map(|event| (key.0, event))
    }

    pub fn next_due(&self) -> Option<i64> {
        self.entries.keys().next().map(|(due, _)| *due)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.due_by_id.clear();
    }
}
