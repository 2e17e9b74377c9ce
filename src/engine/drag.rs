use crate::model::PixelPoint;

/// Tracks a pointer drag used for panning, in pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct DragState {
    pub start_pos: Option<PixelPoint>,
    pub last_pos: Option<PixelPoint>,
}

impl DragState {
    pub fn start(&mut self, pos: PixelPoint) {
        self.start_pos = Some(pos);
        self.last_pos = Some(pos);
    }

    /// Movement since the previous update, `None` when no drag is active.
    pub fn update(&mut self, pos: PixelPoint) -> Option<(f64, f64)> {
        self.start_pos?;
        let last = self.last_pos.replace(pos)?;
        Some((pos.x - last.x, pos.y - last.y))
    }

    pub fn end(&mut self) {
        self.start_pos = None;
        self.last_pos = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.start_pos.is_some()
    }
}
