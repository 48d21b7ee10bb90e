use egui::CursorIcon;
use serde::{Deserialize, Serialize};

/// A grab point on a staged layer or mask object bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handle {
    Move,
    Rotate,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Handle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handle::Move => "move",
            Handle::Rotate => "rotate",
            Handle::North => "n",
            Handle::South => "s",
            Handle::East => "e",
            Handle::West => "w",
            Handle::NorthEast => "ne",
            Handle::NorthWest => "nw",
            Handle::SouthEast => "se",
            Handle::SouthWest => "sw",
        }
    }

    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            Handle::NorthEast | Handle::NorthWest | Handle::SouthEast | Handle::SouthWest
        )
    }

    pub fn is_resize(&self) -> bool {
        !matches!(self, Handle::Move | Handle::Rotate)
    }

    pub fn touches_north(&self) -> bool {
        matches!(self, Handle::North | Handle::NorthEast | Handle::NorthWest)
    }

    pub fn touches_south(&self) -> bool {
        matches!(self, Handle::South | Handle::SouthEast | Handle::SouthWest)
    }

    pub fn touches_east(&self) -> bool {
        matches!(self, Handle::East | Handle::NorthEast | Handle::SouthEast)
    }

    pub fn touches_west(&self) -> bool {
        matches!(self, Handle::West | Handle::NorthWest | Handle::SouthWest)
    }

    /// Screen angle of the handle's outward direction, clockwise from east.
    fn base_angle_degrees(&self) -> Option<f32> {
        match self {
            Handle::East => Some(0.0),
            Handle::SouthEast => Some(45.0),
            Handle::South => Some(90.0),
            Handle::SouthWest => Some(135.0),
            Handle::West => Some(180.0),
            Handle::NorthWest => Some(225.0),
            Handle::North => Some(270.0),
            Handle::NorthEast => Some(315.0),
            Handle::Move | Handle::Rotate => None,
        }
    }

    /// Resize cursor for this handle once the owning object is rotated by
    /// `rotation` radians.
    pub fn cursor_icon(&self, rotation: f32) -> CursorIcon {
        let Some(base) = self.base_angle_degrees() else {
            return match self {
                Handle::Rotate => CursorIcon::Grab,
                _ => CursorIcon::Move,
            };
        };

        let angle = (base + rotation.to_degrees()).rem_euclid(360.0);
        match angle {
            a if a < 22.5 || a >= 337.5 => CursorIcon::ResizeHorizontal,
            a if a < 67.5 => CursorIcon::ResizeNwSe,
            a if a < 112.5 => CursorIcon::ResizeVertical,
            a if a < 157.5 => CursorIcon::ResizeNeSw,
            a if a < 202.5 => CursorIcon::ResizeHorizontal,
            a if a < 247.5 => CursorIcon::ResizeNwSe,
            a if a < 292.5 => CursorIcon::ResizeVertical,
            _ => CursorIcon::ResizeNeSw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_unrotated_cursors() {
        assert_eq!(Handle::East.cursor_icon(0.0), CursorIcon::ResizeHorizontal);
        assert_eq!(Handle::SouthEast.cursor_icon(0.0), CursorIcon::ResizeNwSe);
        assert_eq!(Handle::North.cursor_icon(0.0), CursorIcon::ResizeVertical);
        assert_eq!(Handle::NorthEast.cursor_icon(0.0), CursorIcon::ResizeNeSw);
        assert_eq!(Handle::NorthWest.cursor_icon(0.0), CursorIcon::ResizeNwSe);
    }

    #[test]
    fn test_rotation_shifts_cursor_bucket() {
        assert_eq!(Handle::East.cursor_icon(FRAC_PI_2), CursorIcon::ResizeVertical);
        assert_eq!(Handle::North.cursor_icon(-FRAC_PI_2), CursorIcon::ResizeHorizontal);
        assert_eq!(
            Handle::East.cursor_icon(45f32.to_radians()),
            CursorIcon::ResizeNwSe
        );
    }

    #[test]
    fn test_move_and_rotate_cursors_ignore_rotation() {
        assert_eq!(Handle::Move.cursor_icon(1.0), CursorIcon::Move);
        assert_eq!(Handle::Rotate.cursor_icon(1.0), CursorIcon::Grab);
    }

    #[test]
    fn test_compass_flags() {
        assert!(Handle::NorthEast.touches_north() && Handle::NorthEast.touches_east());
        assert!(!Handle::North.touches_east());
        assert!(Handle::SouthWest.is_corner());
        assert!(!Handle::West.is_corner());
        assert!(!Handle::Rotate.is_resize());
    }
}
