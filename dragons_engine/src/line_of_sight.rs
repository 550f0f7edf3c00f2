//! Straight-line walkability test over the priority map.
//!
//! The ray advances one pixel per step along its dominant axis and by a 16.16
//! fraction along the other, sampling the band at the rounded cursor.

use crate::fixed;
use crate::scene::{Point, Scene};

/// Which bands a ray may cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandRule {
    /// Bands 1..=8.
    Strict,
    /// Bands 1..=16.
    Relaxed,
    /// No geometry test at all.
    Always,
}

impl BandRule {
    pub fn accepts(self, band: i16) -> bool {
        match self {
            BandRule::Strict => (1..9).contains(&band),
            BandRule::Relaxed => (1..17).contains(&band),
            BandRule::Always => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SightMode {
    pub rule: BandRule,
    /// Reject endpoints outside the stage before stepping.
    pub check_bounds: bool,
}

impl SightMode {
    pub const fn new(rule: BandRule) -> Self {
        Self {
            rule,
            check_bounds: true,
        }
    }
}

pub fn visible(scene: &Scene, from: Point, to: Point, mode: SightMode) -> bool {
    if mode.rule == BandRule::Always {
        return true;
    }
    if mode.check_bounds && !(scene.contains(from) && scene.contains(to)) {
        return false;
    }

    let dx = to.x as i32 - from.x as i32;
    let dy = to.y as i32 - from.y as i32;
    if dx == 0 && dy == 0 {
        return true;
    }

    let (steps, step_x, step_y) = if dx.abs() >= dy.abs() {
        (dx.abs(), fixed::from_int(dx.signum()), fixed::ratio(dy, dx))
    } else {
        (dy.abs(), fixed::ratio(dx, dy), fixed::from_int(dy.signum()))
    };

    let mut x = fixed::from_int(from.x as i32);
    let mut y = fixed::from_int(from.y as i32);
    for _ in 0..steps {
        x += step_x;
        y += step_y;
        let (px, py) = (fixed::round(x), fixed::round(y));
        if px == to.x as i32 && py == to.y as i32 {
            return true;
        }
        if !mode.rule.accepts(scene.band_at(px, py)) {
            return false;
        }
    }
    // The dominant axis lands on `to` after `steps` steps and the minor axis
    // error stays under half a pixel, so the loop always returns first.
    true
}
