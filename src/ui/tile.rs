//! The grid tiler: a 12×12 cell picker drawn with block glyphs.
//!
//! State lives in [`GridCursor`]; this module binds keys and the pointer
//! to it, draws the grid with its axis labels, and applies a confirmed
//! rectangle to the window being tiled.

use log::debug;

use crate::grid::{GridCursor, GridRect, MarkAction, GRID_SIZE};
use crate::model::Region;
use crate::screen::event::{Key, MouseButton, MouseEvent, MouseKind};
use crate::screen::{Attrs, Color, Style, Surface};
use crate::traits::{Outcome, Selector, Step, WindowSystem};

/// Grid cells are two columns wide, with a one-cell label gutter on every
/// side: 12 * 2 + 4 columns by 12 + 2 rows.
const VIEW_COLS: u16 = 28;
const VIEW_ROWS: u16 = 14;

pub struct TileUi {
    grid: GridCursor,
    /// A left press anchors the mark once; further presses and drags while
    /// held only move the cursor, so press-drag sweeps out a rectangle.
    hold: bool,
}

impl TileUi {
    pub fn new() -> TileUi {
        TileUi {
            grid: GridCursor::new(),
            hold: false,
        }
    }

    fn draw_labels(&self, surface: &mut Surface) {
        let plain = Style::plain();
        for i in 0..GRID_SIZE {
            let tens = if i >= 9 { '1' } else { ' ' };
            let ones = char::from(b'0' + (i as u8 + 1) % 10);
            let row = i as u16 + 1;
            let col = 2 * i as u16 + 2;
            surface.set(0, row, tens, plain);
            surface.set(1, row, ones, plain);
            surface.set(VIEW_COLS - 2, row, tens, plain);
            surface.set(VIEW_COLS - 1, row, ones, plain);
            surface.set(col, 0, tens, plain);
            surface.set(col + 1, 0, ones, plain);
            surface.set(col, VIEW_ROWS - 1, tens, plain);
            surface.set(col + 1, VIEW_ROWS - 1, ones, plain);
        }
    }

    fn draw_cells(&self, surface: &mut Surface) {
        let rect = self.grid.rect();
        for x in 0..GRID_SIZE {
            for y in 0..GRID_SIZE {
                let mut style = Style::fg(Color::Blue);
                if (x + y) % 2 == 1 {
                    style = style.with(Attrs::BOLD);
                }
                let ch = if (x, y) == self.grid.pos() {
                    style = Style::fg(Color::Cyan);
                    '█'
                } else if rect.as_ref().is_some_and(|r| r.contains(x, y)) {
                    '▓'
                } else {
                    '░'
                };
                let col = 2 * x as u16 + 2;
                let row = y as u16 + 1;
                surface.set(col, row, ch, style);
                surface.set(col + 1, row, ch, style);
            }
        }
    }

    fn draw_prefix(&self, surface: &mut Surface) {
        if self.grid.prefix() > 1 {
            let text = format!("{:>2}", self.grid.prefix());
            surface.print(VIEW_COLS - 2, VIEW_ROWS - 1, &text, Style::fg(Color::Yellow));
        } else {
            surface.print(VIEW_COLS - 2, VIEW_ROWS - 1, "  ", Style::plain());
        }
    }
}

impl Default for TileUi {
    fn default() -> TileUi {
        TileUi::new()
    }
}

impl Selector for TileUi {
    type Choice = GridRect;

    fn viewport(&self) -> (u16, u16) {
        (VIEW_COLS, VIEW_ROWS)
    }

    fn draw(&self, surface: &mut Surface) {
        self.draw_labels(surface);
        self.draw_cells(surface);
        self.draw_prefix(surface);
    }

    fn on_key(&mut self, key: Key) -> Step<GridRect> {
        match key {
            Key::Esc | Key::Char('q') => return Step::Finish(Outcome::Cancelled),
            Key::Up => self.grid.move_by(0, -1),
            Key::Down => self.grid.move_by(0, 1),
            Key::Left => self.grid.move_by(-1, 0),
            Key::Right => self.grid.move_by(1, 0),
            Key::Enter => match self.grid.mark() {
                MarkAction::Anchored => {}
                MarkAction::Confirmed(rect) => return Step::Finish(Outcome::Confirmed(rect)),
            },
            Key::Char(' ') => self.grid.anchor(),
            Key::Tab => self.grid.swap(),
            Key::Backspace => self.grid.clear_mark(),
            Key::Char(ch @ '1'..='9') => self.grid.set_prefix(i32::from(ch as u8 - b'0')),
            Key::Char('0') => self.grid.set_prefix(10),
            Key::Char('-') => self.grid.set_prefix(11),
            Key::Char('=') => self.grid.set_prefix(12),
            _ => {}
        }
        Step::Continue
    }

    fn on_mouse(&mut self, event: MouseEvent) -> Step<GridRect> {
        let (x, y) = cell_at(event.col, event.row);
        match (event.kind, event.button) {
            (MouseKind::Press | MouseKind::Drag, MouseButton::Left) => {
                self.grid.set_cursor(x, y);
                if !self.hold {
                    self.grid.anchor();
                }
                self.hold = true;
            }
            (MouseKind::Press | MouseKind::Drag, MouseButton::Right) => {
                self.grid.anchor_at(x, y);
            }
            (MouseKind::Release, _) => self.hold = false,
            _ => {}
        }
        Step::Continue
    }
}

/// Maps a screen cell back to a grid cell; the gutters round into the
/// nearest cell.
fn cell_at(col: u16, row: u16) -> (i32, i32) {
    ((i32::from(col) - 2) / 2, i32::from(row) - 1)
}

/// Applies a confirmed rectangle: move and resize `window` within `head`,
/// then give it the focus back.
pub fn apply_outcome<W: WindowSystem>(
    wm: &W,
    window: u32,
    head: &Region,
    outcome: Outcome<GridRect>,
) -> Result<(), W::Error> {
    match outcome {
        Outcome::Confirmed(rect) => {
            let region = rect.to_region(head);
            debug!("tiling window 0x{:x} to {:?}", window, region);
            wm.move_resize_window(window, region)?;
            wm.focus_window(window)
        }
        _ => Ok(()),
    }
}

//  Tests
