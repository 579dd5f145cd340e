use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Circle,
    Square,
    Triangle,
    Cross,
}

/// Stroke pattern of a series line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashPattern {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl DashPattern {
    /// Alternating on/off lengths, empty for a solid line
    pub fn segments(&self) -> &'static [u32] {
        match self {
            DashPattern::Solid => &[],
            DashPattern::Dashed => &[10, 5],
            DashPattern::Dotted => &[2, 6],
            DashPattern::DashDot => &[15, 5, 2, 5],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

pub const MARKERS: [Marker; 4] = [
    Marker::Circle,
    Marker::Square,
    Marker::Triangle,
    Marker::Cross,
];

pub const DASHES: [DashPattern; 4] = [
    DashPattern::Solid,
    DashPattern::Dashed,
    DashPattern::Dotted,
    DashPattern::DashDot,
];

pub const COLORS: [Rgb; 6] = [
    Rgb(0x1f, 0x77, 0xb4),
    Rgb(0xff, 0x7f, 0x0e),
    Rgb(0x2c, 0xa0, 0x2c),
    Rgb(0xd6, 0x27, 0x28),
    Rgb(0x94, 0x67, 0xbd),
    Rgb(0x8c, 0x56, 0x4b),
];

/// Round-robin position of `index` in a palette of `palette_len` entries.
pub fn style_for(index: usize, palette_len: usize) -> usize {
    index % palette_len
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesStyle {
    pub marker: Marker,
    pub dash: DashPattern,
    pub color: Rgb,
}

impl SeriesStyle {
    /// `shape` picks marker and dash, `color` picks the color
    pub fn from_indices(shape: usize, color: usize) -> Self {
        Self {
            marker: MARKERS[style_for(shape, MARKERS.len())],
            dash: DASHES[style_for(shape, DASHES.len())],
            color: COLORS[style_for(color, COLORS.len())],
        }
    }
}

/// When the marker and dash index advances within one chart
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleCycle {
    /// Once per series id; leaves of the same series differ by color only
    #[default]
    PerSeries,
    /// Once per leaf series
    PerLeaf,
}

impl FromStr for StyleCycle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-series" => Ok(Self::PerSeries),
            "per-leaf" => Ok(Self::PerLeaf),
            _ => Err(format!(
                "Unknown style cycle {s}, expected per-series or per-leaf"
            )),
        }
    }
}

/// Styles for the leaves of one chart, given each leaf's series id in drawing order.
///
/// Leaves of the same series are expected to be adjacent.
pub fn assign_styles(cycle: StyleCycle, series_ids: &[&str]) -> Vec<SeriesStyle> {
    let mut shape = 0;
    series_ids
        .iter()
        .enumerate()
        .map(|(leaf, id)| {
            match cycle {
                StyleCycle::PerLeaf => shape = leaf,
                StyleCycle::PerSeries => {
                    if leaf > 0 && series_ids[leaf - 1] != *id {
                        shape += 1;
                    }
                }
            }
            SeriesStyle::from_indices(shape, leaf)
        })
        .collect()
}
