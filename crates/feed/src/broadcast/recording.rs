use parking_lot::Mutex;

use super::{Broadcaster, Channel, Event};

/// Broadcaster that keeps every published event, for assertions in tests
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<(Channel, Event)>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(Channel, Event)> {
        self.events.lock().clone()
    }

    /// Events published on one channel, oldest first
    pub fn on_channel(&self, channel: &Channel) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, channel: &Channel, event: &Event) {
        self.events.lock().push((channel.clone(), event.clone()));
    }
}
