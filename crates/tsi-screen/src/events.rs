//! Bounded queue of structured UI events. No persistence.

use std::collections::VecDeque;

use tsi_schemas::EventData;

pub const MAX_EVENTS: usize = 100;

#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<EventData>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append, evicting the oldest entries beyond capacity. Returns how many
    /// were evicted.
    pub fn push(&mut self, event: EventData) -> usize {
        self.events.push_back(event);
        let mut evicted = 0;
        while self.events.len() > self.capacity {
            self.events.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn all(&self) -> Vec<EventData> {
        self.events.iter().cloned().collect()
    }

    pub fn recent(&self, count: usize) -> Vec<EventData> {
        let skip = self.events.len().saturating_sub(count);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsi_schemas::event_types;

    #[test]
    fn keeps_only_the_last_hundred() {
        let mut log = EventLog::new();
        for i in 0..105 {
            let mut e = EventData::new(event_types::BUTTON_CLICKED, "Button");
            e.source_id = format!("b{i}");
            log.push(e);
        }
        assert_eq!(log.len(), MAX_EVENTS);
        assert_eq!(log.all()[0].source_id, "b5");
        assert_eq!(log.recent(1)[0].source_id, "b104");
    }
}
