//! Mapping from time of day to pixel offsets along the track.
//!
//! Everything here is stateless. Offsets are measured from the start of the
//! track (left edge for horizontal bars, top edge for vertical ones) and may
//! be negative; painting clips them.

use serde::Deserialize;

pub const HOURS: u32 = 24;
/// Centres the marker on the hour boundary.
pub const MARKER_BIAS: i32 = 3;
pub const MARKER_WIDTH: u32 = 6;
pub const TICK_WIDTH: u32 = 2;

/// Which screen edge the bar sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Top,
    Bottom,
    Left,
    #[default]
    Right,
}

impl Orientation {
    pub fn name(self) -> &'static str {
        match self {
            Orientation::Top => "top",
            Orientation::Bottom => "bottom",
            Orientation::Left => "left",
            Orientation::Right => "right",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "top" => Some(Orientation::Top),
            "bottom" => Some(Orientation::Bottom),
            "left" => Some(Orientation::Left),
            "right" => Some(Orientation::Right),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Orientation::Top | Orientation::Bottom)
    }

    /// Screen dimension the track runs along.
    pub fn length_of(self, width: u32, height: u32) -> u32 {
        if self.is_horizontal() { width } else { height }
    }

    /// Screen dimension the bar's thickness eats into.
    pub fn across_of(self, width: u32, height: u32) -> u32 {
        if self.is_horizontal() { height } else { width }
    }

    /// Rectangle covering `width` pixels of track starting at `offset`,
    /// spanning the full thickness of the bar.
    pub fn segment(self, offset: i32, width: u32, thickness: u32) -> Rect {
        if self.is_horizontal() {
            Rect { x: offset, y: 0, w: width, h: thickness }
        } else {
            Rect { x: 0, y: offset, w: thickness, h: width }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackGeometry {
    pub length_px: u32,
    pub thickness_px: u32,
}

impl TrackGeometry {
    pub fn hour_tick(&self) -> u32 {
        self.length_px / HOURS
    }
}

/// Thickness must stay strictly below the screen dimension it occupies.
/// An unknown (zero) dimension leaves it alone.
pub fn clamp_thickness(thickness: u32, across: u32) -> u32 {
    if across == 0 { thickness } else { thickness.min(across - 1) }
}

/// Marker offset with the default bias.
pub fn compute_marker(hour: u32, minute: u32, hourtick: u32) -> i32 {
    compute_marker_with_bias(hour, minute, hourtick, MARKER_BIAS)
}

pub fn compute_marker_with_bias(hour: u32, minute: u32, hourtick: u32, bias: i32) -> i32 {
    let within_hour = (minute as f64 / 60.0 * hourtick as f64) as i32;
    ((hourtick * hour) as i32 + within_hour).saturating_sub(bias)
}

pub fn compute_highlight_offset(hour_fraction: f32, hourtick: u32) -> i32 {
    (hour_fraction * hourtick as f32) as i32
}

/// Offsets of the boundaries between hours 0|1 through 22|23.
pub fn compute_hour_tick_offsets(hourtick: u32) -> [i32; 23] {
    std::array::from_fn(|i| (i as i32 + 1) * hourtick as i32)
}
