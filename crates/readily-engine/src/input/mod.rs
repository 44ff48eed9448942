//! Raw rendering-layer events the engine subscribes to.

mod scripted;

pub use scripted::ScriptedInput;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Key {
    /// Play/pause.
    Space,
    Left,
    Right,
    /// Faster.
    Up,
    /// Slower.
    Down,
    PageUp,
    PageDown,
    Home,
    /// Toggle auto-scroll.
    A,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewportEvent {
    /// The viewport's scroll top changed to `offset`.
    Scroll { offset: f32 },
    Wheel,
    Touch,
    Key(Key),
    /// Progress-bar click or drag, in percent of the document.
    Seek { percent: f32 },
}

/// Polled event provider.
pub trait InputProvider {
    type Error;

    fn poll_event(&mut self) -> Result<Option<ViewportEvent>, Self::Error>;
}
