//! Desktop and window records plus the grouped list cursor.
//!
//! The records mirror what the window-manager hint source reports; the
//! [`DeskCursor`] is the selection state machine the switcher UI drives.
//! Every operation is total: out-of-range indices and empty collections are
//! no-ops, never panics, so the UI can map keys to operations without
//! guarding each call.

//  Records

/// One client window as reported by the window manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    /// Window-manager handle, used for activate and close requests.
    pub id: u32,
    pub name: String,
    pub is_active: bool,
    pub is_urgent: bool,
}

/// One desktop and the windows on it, in reported stacking order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopInfo {
    pub index: usize,
    pub name: String,
    pub is_current: bool,
    pub is_urgent: bool,
    pub windows: Vec<WindowInfo>,
}

impl DesktopInfo {
    /// A desktop is worth showing when it has windows or is the current
    /// one (which may be empty).
    pub fn is_visible(&self) -> bool {
        !self.windows.is_empty() || self.is_current
    }
}

//  Screen geometry

/// A pixel rectangle: a screen head, or a window's geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }
}

/// Picks the head containing `point`, defaulting to the first head when
/// the point lies outside all of them (offscreen windows exist).
pub fn pick_head(heads: &[Region], point: (i32, i32)) -> Option<Region> {
    heads
        .iter()
        .copied()
        .find(|head| head.contains(point.0, point.1))
        .or_else(|| heads.first().copied())
}

//  Grouped list cursor

struct DeskEntry {
    info: DesktopInfo,
    /// Retained selected-item index; stays put while other groups are
    /// browsed. Always 0 for an empty group.
    item: usize,
}

/// Selection state over desktops (groups) and their windows (items).
///
/// Construction selects the current desktop and, per desktop, the active
/// window if there is one, so the cursor opens where the user already is.
pub struct DeskCursor {
    desks: Vec<DeskEntry>,
    selected: usize,
}

impl DeskCursor {
    pub fn new(desktops: Vec<DesktopInfo>) -> DeskCursor {
        let selected = desktops
            .iter()
            .position(|desk| desk.is_current)
            .unwrap_or(0);
        let desks = desktops
            .into_iter()
            .map(|info| {
                let item = info
                    .windows
                    .iter()
                    .position(|win| win.is_active)
                    .unwrap_or(0);
                DeskEntry { info, item }
            })
            .collect();
        DeskCursor { desks, selected }
    }

    //  Accessors

    pub fn len(&self) -> usize {
        self.desks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.desks.is_empty()
    }

    pub fn desktop(&self, group: usize) -> Option<&DesktopInfo> {
        self.desks.get(group).map(|entry| &entry.info)
    }

    /// Selected-item index within `group` (0 when the group is empty).
    pub fn item(&self, group: usize) -> usize {
        self.desks.get(group).map_or(0, |entry| entry.item)
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_desktop(&self) -> Option<&DesktopInfo> {
        self.desktop(self.selected)
    }

    /// The window the cursor is on, if the selected group has any.
    pub fn selected_window(&self) -> Option<&WindowInfo> {
        let entry = self.desks.get(self.selected)?;
        entry.info.windows.get(entry.item)
    }

    /// Urgency from the desktop record or any contained window.
    pub fn is_urgent(&self, group: usize) -> bool {
        self.desks.get(group).is_some_and(|entry| {
            entry.info.is_urgent || entry.info.windows.iter().any(|win| win.is_urgent)
        })
    }

    //  Group navigation

    /// Nearest visible group below, down to and including index 0; no
    /// wraparound.
    pub fn prev_group(&mut self) {
        let mut idx = self.selected;
        while idx > 0 {
            idx -= 1;
            if self.desks[idx].info.is_visible() {
                self.selected = idx;
                return;
            }
        }
    }

    /// Nearest visible group above; no wraparound.
    pub fn next_group(&mut self) {
        for idx in self.selected + 1..self.desks.len() {
            if self.desks[idx].info.is_visible() {
                self.selected = idx;
                return;
            }
        }
    }

    /// Jumps straight to group `n` if it exists and has at least one item.
    pub fn select_group(&mut self, n: usize) {
        if self
            .desks
            .get(n)
            .is_some_and(|entry| !entry.info.windows.is_empty())
        {
            self.selected = n;
        }
    }

    /// Selects the current desktop, and its active window if one exists.
    pub fn jump_to_active(&mut self) {
        if let Some(group) = self.desks.iter().position(|entry| entry.info.is_current) {
            self.selected = group;
            if let Some(item) = self.desks[group]
                .info
                .windows
                .iter()
                .position(|win| win.is_active)
            {
                self.desks[group].item = item;
            }
        }
    }

    //  Item navigation

    pub fn prev_item(&mut self) {
        if let Some(entry) = self.desks.get_mut(self.selected) {
            if entry.item > 0 {
                entry.item -= 1;
            }
        }
    }

    pub fn next_item(&mut self) {
        if let Some(entry) = self.desks.get_mut(self.selected) {
            if entry.item + 1 < entry.info.windows.len() {
                entry.item += 1;
            }
        }
    }

    /// Like `next_item` but wraps to the first item past the end.
    pub fn next_item_wrap(&mut self) {
        if let Some(entry) = self.desks.get_mut(self.selected) {
            if !entry.info.windows.is_empty() {
                entry.item = (entry.item + 1) % entry.info.windows.len();
            }
        }
    }

    /// Scans forward item-by-item across non-empty groups, wrapping past
    /// the end, and selects the first urgent window. One full cycle
    /// without a hit leaves the selection unchanged.
    pub fn find_next_urgent(&mut self) {
        let positions: Vec<(usize, usize)> = self
            .desks
            .iter()
            .enumerate()
            .flat_map(|(group, entry)| {
                (0..entry.info.windows.len()).map(move |item| (group, item))
            })
            .collect();
        if positions.is_empty() {
            return;
        }
        let here = (self.selected, self.item(self.selected));
        let at = positions.iter().position(|&pos| pos == here);
        let (begin, steps) = match at {
            // Start just past the cursor and stop before coming back to it.
            Some(idx) => (idx + 1, positions.len() - 1),
            // The selected group is empty; start at the first item of the
            // next non-empty group.
            None => (
                positions
                    .iter()
                    .position(|&(group, _)| group > self.selected)
                    .unwrap_or(0),
                positions.len(),
            ),
        };
        for step in 0..steps {
            let (group, item) = positions[(begin + step) % positions.len()];
            if self.desks[group].info.windows[item].is_urgent {
                self.selected = group;
                self.desks[group].item = item;
                return;
            }
        }
    }
}

//  Tests
