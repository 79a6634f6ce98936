//! X11-specific implementations.
//!
//! This module provides the concrete
//! [`WindowSystem`](crate::traits::WindowSystem) backend, speaking EWMH
//! over an x11rb connection.
//!
//! Nothing outside this module should reference X11 directly.

pub mod wm;
