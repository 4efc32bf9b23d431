//! Background colour → [`Status`].
//!
//! Sheet colours come back as floats, so each status owns a tolerance band
//! around a reference triple instead of an exact value.

use crate::database::Status;
use crate::sheets::Color;

/// Half-width of each band. A channel matches when
/// `reference - BAND <= value < reference + BAND`.
pub const BAND: f64 = 0.005;

/// Reference triples, checked in this order; first match wins.
pub const REFERENCE_COLORS: [(Status, [f64; 3]); 4] = [
    (Status::Watched, [0.204, 0.659, 0.325]),
    (Status::NotLoaded, [0.918, 0.263, 0.208]),
    (Status::Loaded, [0.984, 0.737, 0.016]),
    (Status::NotAired, [0.8, 0.8, 0.8]),
];

/// Classify a cell background. No colour (or an empty one) is `NotAired`;
/// a colour outside every band is `Unknown`.
pub fn classify(color: Option<&Color>) -> Status {
    let color = match color {
        Some(c) if !c.is_empty() => c,
        _ => return Status::NotAired,
    };

    let (r, g, b) = color.channels();
    REFERENCE_COLORS
        .iter()
        .find(|(_, reference)| {
            in_band(r, reference[0]) && in_band(g, reference[1]) && in_band(b, reference[2])
        })
        .map(|(status, _)| *status)
        .unwrap_or(Status::Unknown)
}

fn in_band(value: f64, reference: f64) -> bool {
    value >= reference - BAND && value < reference + BAND
}

/// Colour to paint for a status. `Unknown` has no reference, so it clears
/// the cell to white.
pub fn reference_color(status: Status) -> Color {
    REFERENCE_COLORS
        .iter()
        .find(|(s, _)| *s == status)
        .map(|(_, [r, g, b])| Color::rgb(*r, *g, *b))
        .unwrap_or_else(|| Color::rgb(1.0, 1.0, 1.0))
}
