//! **wmsel** — interactive window selection tools for EWMH window managers.
//!
//! Two small binaries share this crate: `wmsel-switch`, a desktop/window
//! switcher drawn as a tab bar over a window list, and `wmsel-tile`, a
//! 12×12 grid tiler for the active window. Both render text cells into a
//! freshly spawned terminal emulator that adopts our pty master, so they
//! can be bound to a hotkey without needing a terminal of their own.
//!
//! # Architecture
//!
//! The crate is organised around three core traits:
//!
//! * [`traits::WindowSystem`] — abstracts desktop/window hints and window
//!   actions so the selection logic is not coupled to X11.
//! * [`traits::Selector`] — one interactive state machine plus its
//!   presentation; the switcher and the tiler are the two implementations.
//! * [`traits::EventPump`] — the terminal side of the event loop, so the
//!   loop can be driven by a scripted double in tests.
//!
//! Concrete backends live in [`x11`] (EWMH over x11rb) and [`screen`]
//! (cell rendering and input decoding on a tty); [`session`] owns the
//! lifecycle of the emulator-hosted terminal.

pub mod config;
pub mod grid;
pub mod model;
pub mod screen;
pub mod session;
pub mod traits;
pub mod tty;
pub mod ui;
pub mod x11;
