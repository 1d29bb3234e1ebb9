//! Box arithmetic for resize and crop planning
//!
//! All functions are pure and work on plain dimensions, so the planning
//! logic is tested without touching pixels.

use super::params::Gravity;

/// Largest size with the source aspect ratio that fits inside the box
pub fn contain_size(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let scale = f64::min(
        box_w as f64 / src_w as f64,
        box_h as f64 / src_h as f64,
    );
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, box_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, box_h);
    (w, h)
}

/// Top-left corner of an `inner` region placed inside `outer` at `gravity`
///
/// Face and auto gravity have no detector behind them and anchor at the
/// centre.
pub fn anchor_offset(
    gravity: Gravity,
    outer_w: u32,
    outer_h: u32,
    inner_w: u32,
    inner_h: u32,
) -> (u32, u32) {
    let slack_x = outer_w.saturating_sub(inner_w);
    let slack_y = outer_h.saturating_sub(inner_h);
    let center = (slack_x / 2, slack_y / 2);

    match gravity {
        Gravity::North => (center.0, 0),
        Gravity::South => (center.0, slack_y),
        Gravity::East => (slack_x, center.1),
        Gravity::West => (0, center.1),
        Gravity::Center | Gravity::Face | Gravity::Auto => center,
    }
}

/// Largest region of the source with the requested aspect ratio
pub fn aspect_crop(src_w: u32, src_h: u32, ratio_w: u32, ratio_h: u32) -> (u32, u32) {
    let (sw, sh) = (src_w as u64, src_h as u64);
    let (rw, rh) = (ratio_w as u64, ratio_h as u64);

    if sw * rh > sh * rw {
        // too wide, keep full height
        let w = (sh * rw / rh).max(1) as u32;
        (w.min(src_w), src_h)
    } else {
        let h = (sw * rh / rw).max(1) as u32;
        (src_w, h.min(src_h))
    }
}
