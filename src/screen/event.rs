//! Input decoding for the terminal screen.
//!
//! [`Decoder`] is a byte-fed state machine that turns the raw-mode byte
//! stream from the tty into [`InputEvent`]s: the handful of keys the
//! selection UIs bind, plus SGR mouse reports. Sequences it does not
//! recognize are skipped without losing sync.

use std::collections::VecDeque;

//  Event types

/// A decoded input event, or the wakeup injected by an [`crate::tty::Interrupter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Key(Key),
    Mouse(MouseEvent),
    /// The interrupt pipe was poked (normally by the session monitor when
    /// the emulator exits) or the device itself went away.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Esc,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
    Press,
    /// Motion while a button is held.
    Drag,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// A mouse report with 0-based cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseKind,
    pub button: MouseButton,
    pub col: u16,
    pub row: u16,
}

//  Decoder

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    /// Saw ESC; the next byte decides (or a timeout makes it a bare Esc).
    Escape,
    /// Saw ESC O; single-byte cursor keys follow.
    Ss3,
    Csi,
    /// Collecting a multi-byte UTF-8 scalar.
    Utf8,
}

const MAX_CSI_PARAMS: usize = 8;

/// Incremental decoder over the tty byte stream.
///
/// Feed bytes as they arrive and pop completed events with [`Decoder::next`].
/// A trailing lone ESC is held back; the caller decides when to give up
/// waiting for a successor byte and calls [`Decoder::flush_escape`].
pub struct Decoder {
    state: State,
    queue: VecDeque<InputEvent>,
    params: Vec<u32>,
    current: u32,
    /// Saw the `<` marker, i.e. an SGR mouse report.
    sgr: bool,
    utf8: [u8; 4],
    utf8_len: usize,
    utf8_need: usize,
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder {
            state: State::Ground,
            queue: VecDeque::new(),
            params: Vec::new(),
            current: 0,
            sgr: false,
            utf8: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
        }
    }

    /// Pops the next completed event, if any.
    pub fn next(&mut self) -> Option<InputEvent> {
        self.queue.pop_front()
    }

    /// True when the last byte seen was a lone ESC that could still turn
    /// out to be the start of a sequence.
    pub fn pending_escape(&self) -> bool {
        self.state == State::Escape
    }

    /// Resolves a pending lone ESC as the Esc key. No-op otherwise.
    pub fn flush_escape(&mut self) {
        if self.state == State::Escape {
            self.state = State::Ground;
            self.queue.push_back(InputEvent::Key(Key::Esc));
        }
    }

    pub fn feed_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.feed(b);
        }
    }

    pub fn feed(&mut self, byte: u8) {
        match self.state {
            State::Ground => self.ground(byte),
            State::Escape => self.escape(byte),
            State::Ss3 => self.ss3(byte),
            State::Csi => self.csi(byte),
            State::Utf8 => self.utf8_continue(byte),
        }
    }

    fn emit_key(&mut self, key: Key) {
        self.queue.push_back(InputEvent::Key(key));
    }

    fn ground(&mut self, byte: u8) {
        match byte {
            0x1b => self.state = State::Escape,
            b'\r' | b'\n' => self.emit_key(Key::Enter),
            b'\t' => self.emit_key(Key::Tab),
            0x7f | 0x08 => self.emit_key(Key::Backspace),
            0x20..=0x7e => self.emit_key(Key::Char(byte as char)),
            0xc2..=0xf4 => {
                // UTF-8 lead byte; length from the high bits.
                self.utf8[0] = byte;
                self.utf8_len = 1;
                self.utf8_need = if byte >= 0xf0 {
                    4
                } else if byte >= 0xe0 {
                    3
                } else {
                    2
                };
                self.state = State::Utf8;
            }
            // Remaining control bytes and stray continuations are dropped.
            _ => {}
        }
    }

    fn escape(&mut self, byte: u8) {
        match byte {
            b'[' => {
                self.params.clear();
                self.current = 0;
                self.sgr = false;
                self.state = State::Csi;
            }
            b'O' => self.state = State::Ss3,
            0x1b => {
                // Two escapes in a row: the first was a real keypress and
                // the second may still open a sequence.
                self.emit_key(Key::Esc);
            }
            _ => {
                // ESC followed by an ordinary byte: report the Esc key and
                // decode the byte on its own.
                self.emit_key(Key::Esc);
                self.state = State::Ground;
                self.feed(byte);
            }
        }
    }

    fn ss3(&mut self, byte: u8) {
        self.state = State::Ground;
        match byte {
            b'A' => self.emit_key(Key::Up),
            b'B' => self.emit_key(Key::Down),
            b'C' => self.emit_key(Key::Right),
            b'D' => self.emit_key(Key::Left),
            _ => {}
        }
    }

    fn csi(&mut self, byte: u8) {
        match byte {
            b'<' => self.sgr = true,
            b'0'..=b'9' => {
                self.current = self
                    .current
                    .saturating_mul(10)
                    .saturating_add(u32::from(byte - b'0'));
            }
            b';' => {
                if self.params.len() < MAX_CSI_PARAMS {
                    self.params.push(self.current);
                }
                self.current = 0;
            }
            0x40..=0x7e => {
                if self.params.len() < MAX_CSI_PARAMS {
                    self.params.push(self.current);
                }
                self.state = State::Ground;
                self.csi_dispatch(byte);
            }
            // Other intermediates (and anything malformed) just accumulate
            // until a final byte resyncs us.
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, final_byte: u8) {
        match final_byte {
            b'A' => self.emit_key(Key::Up),
            b'B' => self.emit_key(Key::Down),
            b'C' => self.emit_key(Key::Right),
            b'D' => self.emit_key(Key::Left),
            b'M' | b'm' if self.sgr => {
                if let Some(ev) = self.sgr_mouse(final_byte) {
                    self.queue.push_back(InputEvent::Mouse(ev));
                }
            }
            _ => {}
        }
    }

    fn sgr_mouse(&self, final_byte: u8) -> Option<MouseEvent> {
        let b = self.params.first().copied().unwrap_or(0);
        let col = self.params.get(1).copied().unwrap_or(1).max(1) - 1;
        let row = self.params.get(2).copied().unwrap_or(1).max(1) - 1;
        if b & 64 != 0 {
            // Wheel; the UIs have no use for it.
            return None;
        }
        let button = match b & 3 {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            // 3 means "no button"; some emulators report it on release.
            _ if final_byte == b'm' => MouseButton::Left,
            _ => return None,
        };
        let kind = if final_byte == b'm' {
            MouseKind::Release
        } else if b & 32 != 0 {
            MouseKind::Drag
        } else {
            MouseKind::Press
        };
        Some(MouseEvent {
            kind,
            button,
            col: col.min(u32::from(u16::MAX)) as u16,
            row: row.min(u32::from(u16::MAX)) as u16,
        })
    }

    fn utf8_continue(&mut self, byte: u8) {
        if byte & 0xc0 != 0x80 {
            // Broken sequence; drop it and decode the byte normally.
            self.state = State::Ground;
            self.utf8_len = 0;
            self.feed(byte);
            return;
        }
        self.utf8[self.utf8_len] = byte;
        self.utf8_len += 1;
        if self.utf8_len == self.utf8_need {
            self.state = State::Ground;
            if let Ok(s) = std::str::from_utf8(&self.utf8[..self.utf8_len]) {
                if let Some(ch) = s.chars().next() {
                    self.emit_key(Key::Char(ch));
                }
            }
            self.utf8_len = 0;
        }
    }
}

impl Default for Decoder {
    fn default() -> Decoder {
        Decoder::new()
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<InputEvent> {
        let mut dec = Decoder::new();
        dec.feed_all(bytes);
        let mut out = Vec::new();
        while let Some(ev) = dec.next() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn plain_keys() {
        assert_eq!(
            decode(b"q \r\t"),
            vec![
                InputEvent::Key(Key::Char('q')),
                InputEvent::Key(Key::Char(' ')),
                InputEvent::Key(Key::Enter),
                InputEvent::Key(Key::Tab),
            ]
        );
        assert_eq!(
            decode(&[0x7f, 0x08]),
            vec![
                InputEvent::Key(Key::Backspace),
                InputEvent::Key(Key::Backspace),
            ]
        );
    }

    #[test]
    fn arrows_csi_and_ss3() {
        assert_eq!(
            decode(b"\x1b[A\x1b[B\x1bOC\x1bOD"),
            vec![
                InputEvent::Key(Key::Up),
                InputEvent::Key(Key::Down),
                InputEvent::Key(Key::Right),
                InputEvent::Key(Key::Left),
            ]
        );
    }

    #[test]
    fn lone_escape_is_held_until_flushed() {
        let mut dec = Decoder::new();
        dec.feed(0x1b);
        assert_eq!(dec.next(), None);
        assert!(dec.pending_escape());
        dec.flush_escape();
        assert_eq!(dec.next(), Some(InputEvent::Key(Key::Esc)));
        assert!(!dec.pending_escape());
    }

    #[test]
    fn escape_before_plain_byte_yields_both() {
        assert_eq!(
            decode(&[0x1b, b'q']),
            vec![InputEvent::Key(Key::Esc), InputEvent::Key(Key::Char('q'))]
        );
    }

    #[test]
    fn double_escape_emits_first_and_holds_second() {
        let mut dec = Decoder::new();
        dec.feed_all(&[0x1b, 0x1b]);
        assert_eq!(dec.next(), Some(InputEvent::Key(Key::Esc)));
        assert_eq!(dec.next(), None);
        assert!(dec.pending_escape());
    }

    #[test]
    fn sgr_mouse_press_drag_release() {
        assert_eq!(
            decode(b"\x1b[<0;5;3M"),
            vec![InputEvent::Mouse(MouseEvent {
                kind: MouseKind::Press,
                button: MouseButton::Left,
                col: 4,
                row: 2,
            })]
        );
        assert_eq!(
            decode(b"\x1b[<32;6;4M"),
            vec![InputEvent::Mouse(MouseEvent {
                kind: MouseKind::Drag,
                button: MouseButton::Left,
                col: 5,
                row: 3,
            })]
        );
        assert_eq!(
            decode(b"\x1b[<2;1;1m"),
            vec![InputEvent::Mouse(MouseEvent {
                kind: MouseKind::Release,
                button: MouseButton::Right,
                col: 0,
                row: 0,
            })]
        );
    }

    #[test]
    fn wheel_reports_are_dropped() {
        assert_eq!(decode(b"\x1b[<64;2;2M"), vec![]);
        assert_eq!(decode(b"\x1b[<65;2;2M"), vec![]);
    }

    #[test]
    fn multibyte_utf8_char() {
        assert_eq!(
            decode("é!".as_bytes()),
            vec![
                InputEvent::Key(Key::Char('é')),
                InputEvent::Key(Key::Char('!')),
            ]
        );
    }

    #[test]
    fn unknown_csi_is_skipped_without_desync() {
        assert_eq!(
            decode(b"\x1b[5~a"),
            vec![InputEvent::Key(Key::Char('a'))]
        );
    }

    #[test]
    fn split_sequence_across_feeds() {
        let mut dec = Decoder::new();
        dec.feed_all(b"\x1b[");
        assert_eq!(dec.next(), None);
        assert!(!dec.pending_escape());
        dec.feed_all(b"<0;10;");
        dec.feed_all(b"11M");
        assert_eq!(
            dec.next(),
            Some(InputEvent::Mouse(MouseEvent {
                kind: MouseKind::Press,
                button: MouseButton::Left,
                col: 9,
                row: 10,
            }))
        );
    }
}
