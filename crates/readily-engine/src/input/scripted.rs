use alloc::collections::VecDeque;

use super::{InputProvider, ViewportEvent};

/// Queue-backed provider; hosts and tests push events between ticks.
#[derive(Default, Debug, Clone)]
pub struct ScriptedInput {
    events: VecDeque<ViewportEvent>,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ViewportEvent) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<ViewportEvent> for ScriptedInput {
    fn from_iter<I: IntoIterator<Item = ViewportEvent>>(events: I) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

impl InputProvider for ScriptedInput {
    type Error = core::convert::Infallible;

    fn poll_event(&mut self) -> Result<Option<ViewportEvent>, Self::Error> {
        Ok(self.events.pop_front())
    }
}
