use log::error;
use serde::Serialize;

use crate::error::{EngineError, Result};

/// Idle sequences sit at `facing * 2`, walk cycles eight ids later.
pub const WALK_SEQUENCE_BASE: i16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Facing {
    East = 0,
    South = 1,
    West = 2,
    North = 3,
}

impl Facing {
    /// Buckets a slope by the signs of its two diagonal projections.
    ///
    /// A zero slope has no facing. An exact up-left diagonal has no bucket and
    /// is reported as [`EngineError::UnsupportedDirection`].
    pub fn classify(dx: i32, dy: i32) -> Result<Option<Facing>> {
        let u = dx as i64 + dy as i64;
        let v = dx as i64 - dy as i64;
        let facing = match (u.signum(), v.signum()) {
            (0, 0) => return Ok(None),
            (1, 0) | (1, 1) => Facing::East,
            (0, -1) | (1, -1) => Facing::South,
            (-1, -1) => Facing::West,
            (0, 1) | (-1, 1) => Facing::North,
            _ => {
                error!("no walk sequence for slope ({dx:#x}, {dy:#x})");
                return Err(EngineError::UnsupportedDirection { dx, dy });
            }
        };
        Ok(Some(facing))
    }

    pub fn idle_sequence(self) -> i16 {
        self as i16 * 2
    }

    pub fn walk_sequence(self) -> i16 {
        self.idle_sequence() + WALK_SEQUENCE_BASE
    }
}
