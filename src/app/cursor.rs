/// Highlighted row of a panel and the first row drawn in its viewport.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Cursor {
    pub y: usize,
    pub origin: usize,
}

impl Cursor {
    /// Moves one row down; `None` when already on the last row or the panel is empty.
    pub fn move_down(&mut self, bound_count: usize, visible_rows: usize) -> Option<usize> {
        if bound_count == 0 || self.y + 1 >= bound_count {
            return None;
        }
        self.y += 1;
        let rows = visible_rows.max(1);
        if self.y >= self.origin + rows {
            self.origin = self.y + 1 - rows;
        }
        Some(self.y)
    }

    /// Moves one row up; `None` when already on the first row.
    pub fn move_up(&mut self) -> Option<usize> {
        if self.y == 0 {
            return None;
        }
        self.y -= 1;
        if self.y < self.origin {
            self.origin = self.y;
        }
        Some(self.y)
    }

    /// Places the cursor on `y` and scrolls just enough to keep it in view.
    pub fn place(&mut self, y: usize, visible_rows: usize) {
        let rows = visible_rows.max(1);
        self.y = y;
        if y < self.origin {
            self.origin = y;
        } else if y >= self.origin + rows {
            self.origin = y + 1 - rows;
        }
    }
}
