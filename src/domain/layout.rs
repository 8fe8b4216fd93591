/// Terminals at most this wide stack every panel at full width.
pub const NARROW_TERMINAL_WIDTH: u16 = 80;

/// Rows reserved above the panels for the menu bar.
pub const TOP_RESERVED_ROWS: u16 = 1;

/// Number of slots in the hierarchy panel row.
pub const PANEL_SLOTS: u16 = 5;

/// Inset applied to the full-width task detail panel.
pub const DETAIL_MARGIN: u16 = 2;

/// Inclusive character rectangle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bounds {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl Bounds {
    pub fn width(&self) -> u16 {
        self.x1.saturating_sub(self.x0).saturating_add(1)
    }

    pub fn height(&self) -> u16 {
        self.y1.saturating_sub(self.y0).saturating_add(1)
    }

    /// Rows available for list content once the border is drawn.
    pub fn visible_rows(&self) -> usize {
        usize::from(self.height().saturating_sub(2)).max(1)
    }
}

pub fn compute_bounds(
    terminal_width: u16,
    terminal_height: u16,
    panel_index: u16,
    total_panels: u16,
    margin: u16,
) -> Bounds {
    let (start_x, end_x) = if terminal_width <= NARROW_TERMINAL_WIDTH || total_panels == 0 {
        (0, terminal_width.saturating_sub(1))
    } else {
        let width = terminal_width / total_panels;
        let start = panel_index.saturating_mul(width);
        (start, start.saturating_add(width).saturating_sub(1))
    };
    let start_y = TOP_RESERVED_ROWS;
    let end_y = terminal_height.saturating_sub(1).max(start_y);

    let x0 = start_x.saturating_add(margin);
    let y0 = start_y.saturating_add(margin);
    Bounds {
        x0,
        y0,
        x1: end_x.saturating_sub(margin).max(x0),
        y1: end_y.saturating_sub(margin).max(y0),
    }
}
