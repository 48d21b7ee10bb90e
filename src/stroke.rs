use egui::Pos2;

/// Minimum travel before another point is recorded
pub const MIN_POINT_SPACING: f32 = 2.0;

/// The in-progress mask stroke, in selection-relative coordinates.
/// Append-only while the stroke lasts; the renderer previews it every frame
/// and the finished path is turned into a mask.
#[derive(Debug, Clone, Default)]
pub struct PathBuffer {
    points: Vec<Pos2>,
}

impl PathBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new stroke at `start`, discarding any leftover points.
    pub fn begin(&mut self, start: Pos2) {
        self.points.clear();
        self.points.push(start);
    }

    /// Appends `point` if it is far enough from the last one. Returns
    /// whether it was recorded.
    pub fn push(&mut self, point: Pos2) -> bool {
        match self.points.last() {
            Some(last) if last.distance(point) <= MIN_POINT_SPACING => false,
            _ => {
                self.points.push(point);
                true
            }
        }
    }

    pub fn points(&self) -> &[Pos2] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Ends the stroke and hands back its points.
    pub fn take(&mut self) -> Vec<Pos2> {
        std::mem::take(&mut self.points)
    }
}
