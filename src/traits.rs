//! Core traits that decouple the selection UIs from any concrete window
//! manager or terminal.
//!
//! The X11 backend implements [`WindowSystem`]; a
//! [`Screen`](crate::screen::Screen) implements [`EventPump`]; each
//! interactive tool implements [`Selector`]. The event loop in
//! [`crate::ui`] depends only on these abstractions, which is what makes
//! it drivable by scripted doubles in tests.

use crate::model::{DesktopInfo, Region};
use crate::screen::event::{InputEvent, Key, MouseEvent};
use crate::screen::Surface;

/// Abstraction over an EWMH-style window manager: desktop and window hints
/// on the read side, window actions on the write side.
///
/// The hint snapshot is taken once, before any UI opens; a failure there is
/// fatal to the invocation and no session is started. Actions run after
/// the UI has closed again.
pub trait WindowSystem {
    /// The error type produced by this window system.
    type Error: std::error::Error + Send + 'static;

    /// Ordered desktop records with their windows.
    fn desktops(&self) -> Result<Vec<DesktopInfo>, Self::Error>;

    /// Physical screen regions, one per head.
    fn heads(&self) -> Result<Vec<Region>, Self::Error>;

    /// Handle of the focused window, if any.
    fn active_window(&self) -> Result<Option<u32>, Self::Error>;

    /// Current pixel geometry of `window` in root coordinates.
    fn window_geometry(&self, window: u32) -> Result<Region, Self::Error>;

    /// Switch to `desktop`, then focus and raise `window`.
    fn activate_window(&self, window: u32, desktop: usize) -> Result<(), Self::Error>;

    /// Focus and raise `window` without changing desktops.
    fn focus_window(&self, window: u32) -> Result<(), Self::Error>;

    /// Ask the window manager to close `window`.
    fn close_window(&self, window: u32) -> Result<(), Self::Error>;

    /// Move and resize `window` to `region`, in absolute pixels.
    fn move_resize_window(&self, window: u32, region: Region) -> Result<(), Self::Error>;
}

//  Event loop

/// How the UI left the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<C> {
    /// Dismissed; no action follows.
    Cancelled,
    /// The user confirmed this choice.
    Confirmed(C),
    /// The user asked to close the chosen window (switcher only).
    CloseRequested(C),
}

/// What a selector wants after handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<C> {
    Continue,
    Finish(Outcome<C>),
}

/// One interactive selection state machine plus its presentation.
///
/// # Contract
///
/// * [`viewport`](Selector::viewport) is fixed for the selector's lifetime;
///   the hosting terminal is opened at exactly that cell size.
/// * [`draw`](Selector::draw) renders the complete state every time; the
///   surface's dirty tracking decides what actually gets written.
/// * `on_key`/`on_mouse` are total: input the UI does not bind simply
///   returns [`Step::Continue`].
pub trait Selector {
    /// Payload carried by a finishing [`Outcome`].
    type Choice;

    /// Cell size `(cols, rows)` the UI wants.
    fn viewport(&self) -> (u16, u16);

    fn draw(&self, surface: &mut Surface);

    fn on_key(&mut self, key: Key) -> Step<Self::Choice>;

    /// Pointer input; UIs without mouse support keep the default.
    fn on_mouse(&mut self, _event: MouseEvent) -> Step<Self::Choice> {
        Step::Continue
    }
}

/// The terminal side of the event loop: somewhere to draw, and a blocking
/// source of input events that an interrupter can wake.
pub trait EventPump {
    /// The error type produced by the underlying device.
    type Error: std::error::Error + Send + 'static;

    fn surface_mut(&mut self) -> &mut Surface;

    /// Writes the drawn surface out to the device.
    fn present(&mut self) -> Result<(), Self::Error>;

    /// Blocks until an input event, an interrupt, or a device failure.
    fn next_event(&mut self) -> Result<InputEvent, Self::Error>;
}
