//! The window switcher: a tab bar of desktops over the selected desktop's
//! window list.
//!
//! Selection logic lives in [`DeskCursor`]; this module binds keys to its
//! operations, renders the state, and applies the finishing [`Outcome`]
//! to the window manager.

use std::cmp::Ordering;

use log::debug;
use unicode_width::UnicodeWidthStr;

use crate::model::DeskCursor;
use crate::screen::event::Key;
use crate::screen::{Attrs, Color, Style, Surface};
use crate::traits::{Outcome, Selector, Step, WindowSystem};

const INDEX_DIGITS: [char; 10] = ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

/// A confirmed selection: the window and the desktop it lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pick {
    pub desktop: usize,
    pub window: u32,
}

/// The switcher's selector. The viewport is sized once, up front, from
/// the widest window name and the full tab bar, so the tab bar can never
/// run off the terminal.
pub struct SwitchUi {
    cursor: DeskCursor,
    cols: u16,
    rows: u16,
}

impl SwitchUi {
    pub fn new(cursor: DeskCursor) -> SwitchUi {
        let mut names = 0;
        let mut height = 0;
        // Column 0 carries the frame corner; tabs start at column 1.
        let mut tabs = 1;
        for group in 0..cursor.len() {
            if let Some(desk) = cursor.desktop(group) {
                height = height.max(desk.windows.len() as u16);
                for win in &desk.windows {
                    names = names.max(display_width(&win.name));
                }
                if desk.is_visible() {
                    let count = desk.windows.len().to_string();
                    tabs += 4 + display_width(&desk.name) + count.len() as u16;
                }
            }
        }
        let inner = names.max(tabs);
        SwitchUi {
            cursor,
            cols: inner + 2,
            rows: height + 4,
        }
    }

    fn pick(&self) -> Option<Pick> {
        let desktop = self.cursor.selected_desktop()?.index;
        let window = self.cursor.selected_window()?.id;
        Some(Pick { desktop, window })
    }

    /// Rows 0..=2: one tab per visible desktop. The selected tab's caps
    /// turn into `╯`/`╰` so it opens into the list box below it.
    fn draw_tabs(&self, surface: &mut Surface) {
        let frame = Style::fg(Color::Yellow);
        let bold = frame.with(Attrs::BOLD);

        surface.set(0, 2, '╭', bold);
        let mut col = 1;
        for group in 0..self.cursor.len() {
            let Some(desk) = self.cursor.desktop(group) else {
                break;
            };
            if !desk.is_visible() {
                continue;
            }
            let selected = group == self.cursor.selected();

            let mut name_style = Style::fg(if self.cursor.is_urgent(group) {
                Color::Red
            } else {
                Color::Green
            });
            if desk.is_current {
                name_style = name_style.with(Attrs::UNDERLINE);
            }
            if selected {
                name_style = name_style.with(Attrs::BOLD);
            }

            match group.cmp(&self.cursor.selected()) {
                Ordering::Less => {
                    surface.set(col, 0, '╭', frame);
                    surface.set(col, 1, '│', frame);
                    surface.set(col, 2, '─', bold);
                }
                Ordering::Equal => {
                    surface.set(col, 0, '╭', bold);
                    surface.set(col, 1, '│', bold);
                    surface.set(col, 2, '╯', bold);
                }
                Ordering::Greater => {
                    surface.set(col, 0, '─', frame);
                    surface.set(col, 1, ' ', frame);
                    surface.set(col, 2, '─', bold);
                }
            }
            col += 1;

            let index = INDEX_DIGITS.get(group).copied().unwrap_or(' ');
            let count = desk.windows.len().to_string();
            let name_width = display_width(&desk.name);
            let label_width = 2 + name_width + count.len() as u16;

            for c in col..col + label_width {
                if selected {
                    surface.set(c, 0, '─', bold);
                    surface.set(c, 2, ' ', frame);
                } else {
                    surface.set(c, 0, '─', frame);
                    surface.set(c, 2, '─', bold);
                }
            }
            surface.set(col, 1, index, frame);
            surface.print(col + 1, 1, &desk.name, name_style);
            surface.set(col + 1 + name_width, 1, ' ', frame);
            surface.print(col + 2 + name_width, 1, &count, frame);
            col += label_width;

            match group.cmp(&self.cursor.selected()) {
                Ordering::Less => {
                    surface.set(col, 0, '─', frame);
                    surface.set(col, 1, ' ', frame);
                    surface.set(col, 2, '─', bold);
                }
                Ordering::Equal => {
                    surface.set(col, 0, '╮', bold);
                    surface.set(col, 1, '│', bold);
                    surface.set(col, 2, '╰', bold);
                }
                Ordering::Greater => {
                    surface.set(col, 0, '╮', frame);
                    surface.set(col, 1, '│', frame);
                    surface.set(col, 2, '─', bold);
                }
            }
            col += 1;
        }

        for c in col..self.cols - 1 {
            surface.set(c, 2, '─', bold);
        }
        surface.set(self.cols - 1, 2, '╮', bold);
    }

    /// Rows 3.. to the bottom border: the selected desktop's windows,
    /// padded to the full inner width so stale names never linger.
    fn draw_list(&self, surface: &mut Surface) {
        let bold = Style::fg(Color::Yellow).with(Attrs::BOLD);
        let item = self.cursor.item(self.cursor.selected());
        let windows = self
            .cursor
            .selected_desktop()
            .map(|desk| desk.windows.as_slice())
            .unwrap_or(&[]);

        for row in 3..self.rows - 1 {
            surface.set(0, row, '│', bold);
            match windows.get(usize::from(row - 3)) {
                Some(win) => {
                    let mut base = Style::fg(if win.is_urgent {
                        Color::Red
                    } else {
                        Color::Default
                    });
                    if usize::from(row - 3) == item {
                        base = base.with(Attrs::REVERSE);
                    }
                    let mut text = base;
                    if win.is_active {
                        text = text.with(Attrs::UNDERLINE);
                    }
                    surface.print(1, row, &win.name, text);
                    // Padding keeps the reverse band but not the underline.
                    for c in 1 + display_width(&win.name)..self.cols - 1 {
                        surface.set(c, row, ' ', base);
                    }
                }
                None => {
                    for c in 1..self.cols - 1 {
                        surface.set(c, row, ' ', Style::plain());
                    }
                }
            }
            surface.set(self.cols - 1, row, '│', bold);
        }

        let last = self.rows - 1;
        surface.set(0, last, '╰', bold);
        for c in 1..self.cols - 1 {
            surface.set(c, last, '─', bold);
        }
        surface.set(self.cols - 1, last, '╯', bold);
    }
}

impl Selector for SwitchUi {
    type Choice = Pick;

    fn viewport(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    fn draw(&self, surface: &mut Surface) {
        self.draw_tabs(surface);
        self.draw_list(surface);
    }

    fn on_key(&mut self, key: Key) -> Step<Pick> {
        match key {
            Key::Esc | Key::Char('q') => return Step::Finish(Outcome::Cancelled),
            Key::Left | Key::Char('w') => self.cursor.prev_group(),
            Key::Right | Key::Char('s') => self.cursor.next_group(),
            Key::Up | Key::Char('a') => self.cursor.prev_item(),
            Key::Down | Key::Char('d') => self.cursor.next_item(),
            Key::Tab => self.cursor.next_item_wrap(),
            Key::Enter | Key::Char(' ') => {
                // Confirming an empty desktop selects nothing; stay open.
                if let Some(pick) = self.pick() {
                    return Step::Finish(Outcome::Confirmed(pick));
                }
            }
            Key::Backspace => {
                if let Some(pick) = self.pick() {
                    return Step::Finish(Outcome::CloseRequested(pick));
                }
            }
            Key::Char('e') => self.cursor.jump_to_active(),
            Key::Char('!') => self.cursor.find_next_urgent(),
            Key::Char(ch @ '0'..='9') => {
                self.cursor.select_group(ch as usize - '0' as usize);
            }
            _ => {}
        }
        Step::Continue
    }
}

/// Applies the switcher's outcome to the window manager.
pub fn apply_outcome<W: WindowSystem>(wm: &W, outcome: Outcome<Pick>) -> Result<(), W::Error> {
    match outcome {
        Outcome::Cancelled => Ok(()),
        Outcome::Confirmed(pick) => {
            debug!(
                "activating window 0x{:x} on desktop {}",
                pick.window, pick.desktop
            );
            wm.activate_window(pick.window, pick.desktop)
        }
        Outcome::CloseRequested(pick) => {
            debug!("asking the window manager to close 0x{:x}", pick.window);
            wm.close_window(pick.window)
        }
    }
}

fn display_width(text: &str) -> u16 {
    UnicodeWidthStr::width(text) as u16
}

//  Tests
