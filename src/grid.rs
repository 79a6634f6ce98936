//! The tiling grid cursor.
//!
//! A fixed 12×12 grid laid over one screen head. The user moves a cursor,
//! anchors a mark, and confirms; the marked cells become a [`GridRect`]
//! that [`GridRect::to_region`] maps onto the head's pixel geometry.
//!
//! Movement keys accept a repeat-count prefix between 1 and 12 (digits,
//! `0` for 10, and the two keys after it on the digit row for 11 and 12).
//! The prefix is pending until the next move or mark consumes it; a fresh
//! prefix simply overwrites a pending one.

use crate::model::Region;

/// Cells per grid axis.
pub const GRID_SIZE: i32 = 12;

/// A normalized, inclusive rectangle of grid cells.
///
/// `x0 <= x1` and `y0 <= y1` always hold; the constructor normalizes, so
/// the mark/cursor corner order never matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl GridRect {
    fn from_corners(a: (i32, i32), b: (i32, i32)) -> GridRect {
        GridRect {
            x0: a.0.min(b.0),
            y0: a.1.min(b.1),
            x1: a.0.max(b.0),
            y1: a.1.max(b.1),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Maps the cell rectangle onto `head` in absolute pixels.
    ///
    /// A cell is `1/12` of the head per axis; the inclusive cell span
    /// `x0..=x1` covers `x1 + 1 - x0` cells.
    pub fn to_region(&self, head: &Region) -> Region {
        let step_x = head.width as i32 / GRID_SIZE;
        let step_y = head.height as i32 / GRID_SIZE;
        Region {
            x: head.x + self.x0 * step_x,
            y: head.y + self.y0 * step_y,
            width: ((self.x1 + 1 - self.x0) * step_x) as u32,
            height: ((self.y1 + 1 - self.y0) * step_y) as u32,
        }
    }
}

/// What a mark press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkAction {
    /// First press: the mark is now anchored at the cursor.
    Anchored,
    /// Second press: the rectangle is final.
    Confirmed(GridRect),
}

/// Cursor, optional mark and pending repeat prefix on the 12×12 grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCursor {
    x: i32,
    y: i32,
    mark: Option<(i32, i32)>,
    prefix: i32,
}

impl GridCursor {
    /// A cursor at the origin with no mark and no pending prefix.
    pub fn new() -> GridCursor {
        GridCursor {
            x: 0,
            y: 0,
            mark: None,
            prefix: 1,
        }
    }

    //  Accessors

    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn mark_pos(&self) -> Option<(i32, i32)> {
        self.mark
    }

    /// The pending repeat count (1 when none is pending).
    pub fn prefix(&self) -> i32 {
        self.prefix
    }

    /// The rectangle between mark and cursor, once a mark exists.
    pub fn rect(&self) -> Option<GridRect> {
        self.mark
            .map(|mark| GridRect::from_corners(mark, (self.x, self.y)))
    }

    //  Operations

    /// Steps the cursor by `(dx, dy)` scaled by the pending prefix,
    /// clamped to the grid. Consumes the prefix. The mark stays put.
    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.x = clamp_cell(self.x + dx * self.prefix);
        self.y = clamp_cell(self.y + dy * self.prefix);
        self.prefix = 1;
    }

    /// Sets the pending repeat count, overwriting any previous one.
    /// Values are clamped to `1..=12`.
    pub fn set_prefix(&mut self, count: i32) {
        self.prefix = count.clamp(1, GRID_SIZE);
    }

    /// The two-press protocol: the first press anchors the mark at the
    /// cursor, the second confirms the rectangle. Consumes the prefix.
    pub fn mark(&mut self) -> MarkAction {
        self.prefix = 1;
        match self.rect() {
            Some(rect) => MarkAction::Confirmed(rect),
            None => {
                self.mark = Some((self.x, self.y));
                MarkAction::Anchored
            }
        }
    }

    /// Re-anchors the mark at the cursor, whether or not one exists.
    pub fn anchor(&mut self) {
        self.mark = Some((self.x, self.y));
    }

    /// Exchanges cursor and mark. No-op without a mark.
    pub fn swap(&mut self) {
        if let Some((mx, my)) = self.mark {
            self.mark = Some((self.x, self.y));
            self.x = mx;
            self.y = my;
        }
    }

    /// Removes the mark only; cursor and prefix are untouched.
    pub fn clear_mark(&mut self) {
        self.mark = None;
    }

    //  Pointer support

    /// Puts the cursor on a cell directly (clamped).
    pub fn set_cursor(&mut self, x: i32, y: i32) {
        self.x = clamp_cell(x);
        self.y = clamp_cell(y);
    }

    /// Anchors the mark on a cell directly (clamped).
    pub fn anchor_at(&mut self, x: i32, y: i32) {
        self.mark = Some((clamp_cell(x), clamp_cell(y)));
    }
}

impl Default for GridCursor {
    fn default() -> GridCursor {
        GridCursor::new()
    }
}

fn clamp_cell(v: i32) -> i32 {
    v.clamp(0, GRID_SIZE - 1)
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_clamp_to_the_grid() {
        let mut cursor = GridCursor::new();
        cursor.move_by(-1, -1);
        assert_eq!(cursor.pos(), (0, 0));
        cursor.set_cursor(11, 11);
        cursor.move_by(1, 1);
        assert_eq!(cursor.pos(), (11, 11));
    }

    #[test]
    fn prefix_scales_a_move_and_clamps() {
        let mut cursor = GridCursor::new();
        cursor.set_prefix(5);
        cursor.move_by(1, 0);
        assert_eq!(cursor.pos(), (5, 0));
        // x=10 with prefix 5 clamps at the edge, not 15.
        cursor.set_cursor(10, 0);
        cursor.set_prefix(5);
        cursor.move_by(1, 0);
        assert_eq!(cursor.pos(), (11, 0));
    }

    #[test]
    fn prefix_is_consumed_by_the_move() {
        let mut cursor = GridCursor::new();
        cursor.set_prefix(3);
        cursor.move_by(1, 0);
        cursor.move_by(1, 0);
        assert_eq!(cursor.pos(), (4, 0));
        assert_eq!(cursor.prefix(), 1);
    }

    #[test]
    fn mark_consumes_the_prefix() {
        let mut cursor = GridCursor::new();
        cursor.set_prefix(4);
        assert_eq!(cursor.mark(), MarkAction::Anchored);
        assert_eq!(cursor.prefix(), 1);
        // The confirming press spends one as well.
        cursor.set_prefix(9);
        assert!(matches!(cursor.mark(), MarkAction::Confirmed(_)));
        assert_eq!(cursor.prefix(), 1);
    }

    #[test]
    fn later_prefix_overwrites_the_pending_one() {
        let mut cursor = GridCursor::new();
        cursor.set_prefix(1);
        cursor.set_prefix(2);
        cursor.move_by(1, 0);
        // Moves by 2, not 12: digits do not accumulate.
        assert_eq!(cursor.pos(), (2, 0));
    }

    #[test]
    fn mark_needs_two_presses_to_confirm() {
        let mut cursor = GridCursor::new();
        cursor.set_cursor(3, 4);
        assert_eq!(cursor.mark(), MarkAction::Anchored);
        cursor.move_by(2, 1);
        let rect = match cursor.mark() {
            MarkAction::Confirmed(rect) => rect,
            MarkAction::Anchored => panic!("second press must confirm"),
        };
        assert_eq!(
            rect,
            GridRect {
                x0: 3,
                y0: 4,
                x1: 5,
                y1: 5
            }
        );
    }

    #[test]
    fn confirming_in_place_yields_a_single_cell() {
        let mut cursor = GridCursor::new();
        cursor.set_cursor(7, 2);
        cursor.mark();
        assert_eq!(
            cursor.mark(),
            MarkAction::Confirmed(GridRect {
                x0: 7,
                y0: 2,
                x1: 7,
                y1: 2
            })
        );
    }

    #[test]
    fn rectangle_is_order_independent() {
        let mut a = GridCursor::new();
        a.set_cursor(5, 7);
        a.anchor();
        a.set_cursor(1, 2);
        let mut b = GridCursor::new();
        b.set_cursor(1, 2);
        b.anchor();
        b.set_cursor(5, 7);
        let expected = GridRect {
            x0: 1,
            y0: 2,
            x1: 5,
            y1: 7,
        };
        assert_eq!(a.rect(), Some(expected));
        assert_eq!(b.rect(), Some(expected));
    }

    #[test]
    fn mark_is_invariant_under_cursor_motion() {
        let mut cursor = GridCursor::new();
        cursor.set_cursor(2, 2);
        cursor.anchor();
        cursor.move_by(3, 0);
        cursor.move_by(0, 4);
        assert_eq!(cursor.mark_pos(), Some((2, 2)));
    }

    #[test]
    fn swap_exchanges_cursor_and_mark() {
        let mut cursor = GridCursor::new();
        cursor.set_cursor(1, 1);
        cursor.anchor();
        cursor.set_cursor(8, 9);
        cursor.swap();
        assert_eq!(cursor.pos(), (1, 1));
        assert_eq!(cursor.mark_pos(), Some((8, 9)));
        // Without a mark nothing happens.
        cursor.clear_mark();
        cursor.swap();
        assert_eq!(cursor.pos(), (1, 1));
    }

    #[test]
    fn clear_removes_only_the_mark() {
        let mut cursor = GridCursor::new();
        cursor.set_cursor(4, 4);
        cursor.anchor();
        cursor.set_prefix(6);
        cursor.clear_mark();
        assert_eq!(cursor.mark_pos(), None);
        assert_eq!(cursor.pos(), (4, 4));
        assert_eq!(cursor.prefix(), 6);
    }

    #[test]
    fn anchor_overwrites_an_existing_mark() {
        let mut cursor = GridCursor::new();
        cursor.anchor();
        cursor.set_cursor(5, 5);
        cursor.anchor();
        assert_eq!(cursor.mark_pos(), Some((5, 5)));
    }

    #[test]
    fn pointer_cells_are_clamped() {
        let mut cursor = GridCursor::new();
        cursor.set_cursor(40, -3);
        assert_eq!(cursor.pos(), (11, 0));
        cursor.anchor_at(99, 99);
        assert_eq!(cursor.mark_pos(), Some((11, 11)));
    }

    #[test]
    fn full_grid_maps_to_the_whole_head() {
        let head = Region {
            x: 1920,
            y: 100,
            width: 1920,
            height: 1080,
        };
        let rect = GridRect {
            x0: 0,
            y0: 0,
            x1: 11,
            y1: 11,
        };
        assert_eq!(rect.to_region(&head), head);
    }

    #[test]
    fn single_cell_maps_to_one_step_with_head_offset() {
        let head = Region {
            x: 1920,
            y: 0,
            width: 1920,
            height: 1080,
        };
        let rect = GridRect {
            x0: 1,
            y0: 2,
            x1: 1,
            y1: 2,
        };
        assert_eq!(
            rect.to_region(&head),
            Region {
                x: 1920 + 160,
                y: 180,
                width: 160,
                height: 90
            }
        );
    }
}
