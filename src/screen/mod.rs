//! Cell-based terminal rendering and input.
//!
//! A [`Screen`] owns one terminal device: either the slave side of the pty a
//! [`crate::session::TermSession`] spawned an emulator on, or the invoking
//! terminal itself (see [`Screen::attach`]). It puts the device into raw
//! mode, switches to the alternate screen, and exposes a cell [`Surface`]
//! to draw on plus a blocking [`Screen::next_event`] that can be woken from
//! another thread through an [`Interrupter`].
//!
//! Everything the screen touches is restored in reverse order when it is
//! closed or dropped, so no state leaks onto the device even on a panic.

pub mod event;

use crate::tty::{self, InterruptPipe, Interrupter, PollInput, RawModeGuard};
use event::{Decoder, InputEvent};

use bitflags::bitflags;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{
    Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetForegroundColor,
};
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::QueueableCommand;
use log::debug;
use thiserror::Error;
use unicode_width::UnicodeWidthChar;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// How long a lone ESC byte may sit in the decoder before it is reported
/// as the Esc key rather than the start of a sequence.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(25);

//  Errors

#[derive(Debug, Error)]
pub enum ScreenError {
    #[error("failed to open terminal device {path}: {source}")]
    Open { path: String, source: io::Error },
    #[error("terminal setup failed: {0}")]
    Setup(#[source] io::Error),
    #[error("terminal device reports zero size")]
    NoSize,
    #[error("terminal write failed: {0}")]
    Write(#[source] io::Error),
    #[error("terminal read failed: {0}")]
    Read(#[source] io::Error),
}

//  Styles

bitflags! {
    /// Display attributes a cell can carry on top of its color.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attrs: u8 {
        const BOLD = 1;
        const UNDERLINE = 1 << 1;
        const REVERSE = 1 << 2;
    }
}

/// Foreground colors the UIs use. `Default` keeps the terminal's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Blue,
    Cyan,
    Green,
    Red,
    Yellow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub color: Color,
    pub attrs: Attrs,
}

impl Style {
    pub fn plain() -> Style {
        Style::default()
    }

    pub fn fg(color: Color) -> Style {
        Style {
            color,
            attrs: Attrs::empty(),
        }
    }

    pub fn with(mut self, attrs: Attrs) -> Style {
        self.attrs |= attrs;
        self
    }
}

/// One character cell. Wide characters occupy their own cell plus a `\0`
/// continuation cell that the painter skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Cell {
        Cell {
            ch: ' ',
            style: Style::default(),
        }
    }
}

//  Surface

/// The back buffer UIs draw into. Out-of-range writes are ignored, so
/// drawing code never needs bounds arithmetic of its own.
pub struct Surface {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
    dirty: Vec<bool>,
}

impl Surface {
    pub fn new(cols: u16, rows: u16) -> Surface {
        Surface {
            cols,
            rows,
            cells: vec![Cell::default(); usize::from(cols) * usize::from(rows)],
            dirty: vec![true; usize::from(rows)],
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    pub fn set(&mut self, col: u16, row: u16, ch: char, style: Style) {
        if col >= self.cols || row >= self.rows {
            return;
        }
        let idx = usize::from(row) * usize::from(self.cols) + usize::from(col);
        let cell = Cell { ch, style };
        if self.cells[idx] != cell {
            self.cells[idx] = cell;
            self.dirty[usize::from(row)] = true;
        }
    }

    /// Writes a string starting at `(col, row)`, advancing by display
    /// width. Wide characters get a continuation cell; zero-width ones are
    /// dropped.
    pub fn print(&mut self, col: u16, row: u16, text: &str, style: Style) {
        let mut col = col;
        for ch in text.chars() {
            let width = ch.width().unwrap_or(0) as u16;
            if width == 0 {
                continue;
            }
            self.set(col, row, ch, style);
            if width > 1 {
                self.set(col + 1, row, '\0', style);
            }
            col = col.saturating_add(width);
            if col >= self.cols {
                break;
            }
        }
    }

    /// Resets every cell to a blank default and marks everything dirty.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::default();
        }
        for d in &mut self.dirty {
            *d = true;
        }
    }

    pub fn cell(&self, col: u16, row: u16) -> Option<Cell> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(self.cells[usize::from(row) * usize::from(self.cols) + usize::from(col)])
    }

    fn row(&self, row: u16) -> &[Cell] {
        let start = usize::from(row) * usize::from(self.cols);
        &self.cells[start..start + usize::from(self.cols)]
    }
}

//  Screen

/// A terminal device prepared for cell rendering and raw input.
pub struct Screen {
    // Declared before `tty` so raw mode is restored while the fd is open.
    raw: Option<RawModeGuard>,
    tty: File,
    pipe: InterruptPipe,
    decoder: Decoder,
    surface: Surface,
    mouse: bool,
    restored: bool,
}

impl Screen {
    /// Opens the given terminal device and takes it over.
    pub fn open(path: &str, mouse: bool) -> Result<Screen, ScreenError> {
        let tty = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| ScreenError::Open {
                path: path.to_owned(),
                source,
            })?;
        let (cols, rows) = tty::winsize(tty.as_raw_fd()).map_err(ScreenError::Setup)?;
        if cols == 0 || rows == 0 {
            return Err(ScreenError::NoSize);
        }
        let raw = RawModeGuard::enable(tty.as_raw_fd()).map_err(ScreenError::Setup)?;
        let pipe = InterruptPipe::new().map_err(ScreenError::Setup)?;
        let mut screen = Screen {
            raw: Some(raw),
            tty,
            pipe,
            decoder: Decoder::new(),
            surface: Surface::new(cols, rows),
            mouse,
            restored: false,
        };
        screen.enter()?;
        Ok(screen)
    }

    /// Takes over the invoking terminal instead of a spawned one.
    pub fn attach(mouse: bool) -> Result<Screen, ScreenError> {
        Screen::open("/dev/tty", mouse)
    }

    fn enter(&mut self) -> Result<(), ScreenError> {
        let mut buf: Vec<u8> = Vec::new();
        buf.queue(EnterAlternateScreen)
            .and_then(|b| b.queue(Hide))
            .and_then(|b| b.queue(Clear(ClearType::All)))
            .map_err(ScreenError::Write)?;
        if self.mouse {
            write!(buf, "\x1b[?1000h").map_err(ScreenError::Write)?; // click tracking
            write!(buf, "\x1b[?1002h").map_err(ScreenError::Write)?; // drag tracking
            write!(buf, "\x1b[?1006h").map_err(ScreenError::Write)?; // SGR encoding
        }
        self.write_all(&buf)
    }

    /// Undoes everything `enter` did. Idempotent; also run from `Drop`.
    /// Write errors are only logged since the device may already be gone.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let mut buf: Vec<u8> = Vec::new();
        let queued = (|| -> io::Result<()> {
            if self.mouse {
                write!(buf, "\x1b[?1006l")?;
                write!(buf, "\x1b[?1002l")?;
                write!(buf, "\x1b[?1000l")?;
            }
            buf.queue(ResetColor)?;
            buf.queue(Show)?;
            buf.queue(LeaveAlternateScreen)?;
            Ok(())
        })();
        let written = queued.and_then(|()| (&self.tty).write_all(&buf));
        if let Err(err) = written {
            debug!("screen restore write failed: {err}");
        }
        // Dropping the guard puts the original termios back.
        self.raw.take();
    }

    pub fn size(&self) -> (u16, u16) {
        self.surface.size()
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Handle that wakes a blocked [`Screen::next_event`] from any thread.
    pub fn interrupter(&self) -> Interrupter {
        self.pipe.interrupter()
    }

    /// Writes all dirty surface rows to the device in one burst.
    pub fn flush(&mut self) -> Result<(), ScreenError> {
        let mut buf: Vec<u8> = Vec::new();
        for row in 0..self.surface.rows {
            if !self.surface.dirty[usize::from(row)] {
                continue;
            }
            paint_row(&mut buf, row, self.surface.row(row)).map_err(ScreenError::Write)?;
            self.surface.dirty[usize::from(row)] = false;
        }
        if buf.is_empty() {
            return Ok(());
        }
        buf.queue(SetAttribute(Attribute::Reset))
            .map_err(ScreenError::Write)?;
        self.write_all(&buf)
    }

    /// Blocks until a key or mouse event arrives, the device goes away, or
    /// the interrupter fires.
    pub fn next_event(&mut self) -> Result<InputEvent, ScreenError> {
        loop {
            if let Some(ev) = self.decoder.next() {
                return Ok(ev);
            }
            let timeout = if self.decoder.pending_escape() {
                Some(ESCAPE_TIMEOUT)
            } else {
                None
            };
            let readable = tty::poll_input(self.tty.as_raw_fd(), self.pipe.read_fd(), timeout)
                .map_err(ScreenError::Read)?;
            match readable {
                PollInput::TimedOut => self.decoder.flush_escape(),
                PollInput::Interrupt => {
                    self.pipe.drain();
                    return Ok(InputEvent::Interrupted);
                }
                PollInput::Tty => {
                    let mut bytes = [0u8; 256];
                    let n = match (&self.tty).read(&mut bytes) {
                        Ok(n) => n,
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                        // A pty slave reads EIO once the master side is
                        // gone. Same meaning as EOF below.
                        Err(err) if err.raw_os_error() == Some(libc::EIO) => 0,
                        Err(err) => return Err(ScreenError::Read(err)),
                    };
                    if n == 0 {
                        // The device went away, which happens when the
                        // emulator exits before the monitor thread gets to
                        // poke us. Either way the session is over.
                        debug!("terminal device closed, treating as interrupt");
                        return Ok(InputEvent::Interrupted);
                    }
                    self.decoder.feed_all(&bytes[..n]);
                }
            }
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), ScreenError> {
        (&self.tty)
            .write_all(buf)
            .and_then(|()| (&self.tty).flush())
            .map_err(ScreenError::Write)
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.restore();
    }
}

impl crate::traits::EventPump for Screen {
    type Error = ScreenError;

    fn surface_mut(&mut self) -> &mut Surface {
        Screen::surface_mut(self)
    }

    fn present(&mut self) -> Result<(), ScreenError> {
        self.flush()
    }

    fn next_event(&mut self) -> Result<InputEvent, ScreenError> {
        Screen::next_event(self)
    }
}

fn paint_row(buf: &mut Vec<u8>, row: u16, cells: &[Cell]) -> io::Result<()> {
    buf.queue(MoveTo(0, row))?;
    let mut current: Option<Style> = None;
    let mut text = String::new();
    for cell in cells {
        // Continuation cell of a wide character; the glyph before it
        // already advanced the cursor.
        if cell.ch == '\0' {
            continue;
        }
        if current != Some(cell.style) {
            if !text.is_empty() {
                buf.queue(Print(&text))?;
                text.clear();
            }
            apply_style(buf, cell.style)?;
            current = Some(cell.style);
        }
        text.push(cell.ch);
    }
    if !text.is_empty() {
        buf.queue(Print(&text))?;
    }
    Ok(())
}

fn apply_style(buf: &mut Vec<u8>, style: Style) -> io::Result<()> {
    buf.queue(SetAttribute(Attribute::Reset))?;
    if style.color != Color::Default {
        buf.queue(SetForegroundColor(term_color(style.color)))?;
    }
    if style.attrs.contains(Attrs::BOLD) {
        buf.queue(SetAttribute(Attribute::Bold))?;
    }
    if style.attrs.contains(Attrs::UNDERLINE) {
        buf.queue(SetAttribute(Attribute::Underlined))?;
    }
    if style.attrs.contains(Attrs::REVERSE) {
        buf.queue(SetAttribute(Attribute::Reverse))?;
    }
    Ok(())
}

fn term_color(color: Color) -> TermColor {
    match color {
        Color::Default => TermColor::Reset,
        // The base ANSI palette, same as the classic termbox colors.
        Color::Blue => TermColor::DarkBlue,
        Color::Cyan => TermColor::DarkCyan,
        Color::Green => TermColor::DarkGreen,
        Color::Red => TermColor::DarkRed,
        Color::Yellow => TermColor::DarkYellow,
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tty::PtyPair;
    use std::os::fd::RawFd;

    #[test]
    fn surface_set_and_get() {
        let mut s = Surface::new(10, 3);
        s.set(2, 1, 'x', Style::fg(Color::Red));
        assert_eq!(
            s.cell(2, 1),
            Some(Cell {
                ch: 'x',
                style: Style::fg(Color::Red)
            })
        );
        // Out of range is ignored, not a panic.
        s.set(10, 1, 'y', Style::plain());
        s.set(2, 3, 'y', Style::plain());
        assert_eq!(s.cell(10, 1), None);
    }

    #[test]
    fn surface_print_handles_wide_chars() {
        let mut s = Surface::new(10, 1);
        s.print(0, 0, "a字b", Style::plain());
        assert_eq!(s.cell(0, 0).map(|c| c.ch), Some('a'));
        assert_eq!(s.cell(1, 0).map(|c| c.ch), Some('字'));
        assert_eq!(s.cell(2, 0).map(|c| c.ch), Some('\0'));
        assert_eq!(s.cell(3, 0).map(|c| c.ch), Some('b'));
    }

    #[test]
    fn surface_print_stops_at_edge() {
        let mut s = Surface::new(4, 1);
        s.print(2, 0, "abcdef", Style::plain());
        assert_eq!(s.cell(3, 0).map(|c| c.ch), Some('b'));
    }

    /// Reads whatever the screen wrote to the pty, via the master side.
    fn drain_master(fd: RawFd) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let mut fds = [libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            }];
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, 50) };
            if rc <= 0 {
                break;
            }
            let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                break;
            }
            out.extend_from_slice(&buf[..n as usize]);
        }
        out
    }

    fn write_master(fd: RawFd, bytes: &[u8]) {
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast(), bytes.len()) };
        assert_eq!(n as usize, bytes.len());
    }

    fn open_test_screen(mouse: bool) -> (PtyPair, Screen) {
        let pty = PtyPair::open().unwrap();
        crate::tty::set_winsize(pty.slave.as_raw_fd(), 20, 5).unwrap();
        let screen = Screen::open(&pty.slave_path, mouse).unwrap();
        (pty, screen)
    }

    #[test]
    fn open_requires_a_size() {
        let pty = PtyPair::open().unwrap();
        assert!(matches!(
            Screen::open(&pty.slave_path, false),
            Err(ScreenError::NoSize)
        ));
    }

    #[test]
    fn flush_writes_dirty_rows_to_the_device() {
        let (pty, mut screen) = open_test_screen(false);
        drain_master(pty.master.as_raw_fd());
        screen.surface_mut().print(0, 0, "hello", Style::fg(Color::Green));
        screen.flush().unwrap();
        let out = String::from_utf8_lossy(&drain_master(pty.master.as_raw_fd())).into_owned();
        assert!(out.contains("hello"), "missing text in {out:?}");
        // Nothing dirty, nothing written.
        screen.flush().unwrap();
        assert!(drain_master(pty.master.as_raw_fd()).is_empty());
    }

    #[test]
    fn next_event_decodes_bytes_from_the_device() {
        let (pty, mut screen) = open_test_screen(false);
        write_master(pty.master.as_raw_fd(), b"\x1b[A");
        assert_eq!(
            screen.next_event().unwrap(),
            InputEvent::Key(event::Key::Up)
        );
        write_master(pty.master.as_raw_fd(), b"q");
        assert_eq!(
            screen.next_event().unwrap(),
            InputEvent::Key(event::Key::Char('q'))
        );
    }

    #[test]
    fn lone_escape_resolves_after_the_grace_period() {
        let (pty, mut screen) = open_test_screen(false);
        write_master(pty.master.as_raw_fd(), b"\x1b");
        assert_eq!(
            screen.next_event().unwrap(),
            InputEvent::Key(event::Key::Esc)
        );
    }

    #[test]
    fn interrupter_unblocks_next_event() {
        let (_pty, mut screen) = open_test_screen(false);
        let intr = screen.interrupter();
        let poker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            intr.interrupt();
        });
        assert_eq!(screen.next_event().unwrap(), InputEvent::Interrupted);
        poker.join().unwrap();
    }

    #[test]
    fn mouse_modes_are_set_and_reset() {
        let (pty, screen) = open_test_screen(true);
        let out = String::from_utf8_lossy(&drain_master(pty.master.as_raw_fd())).into_owned();
        assert!(out.contains("\x1b[?1006h"));
        drop(screen);
        let out = String::from_utf8_lossy(&drain_master(pty.master.as_raw_fd())).into_owned();
        assert!(out.contains("\x1b[?1006l"));
        assert!(out.contains("\x1b[?1049l"), "alt screen not left: {out:?}");
    }
}
