use std::fmt;

use dragons_formats::{SceneDescription, UNUSED_WAYPOINT, WAYPOINT_SLOTS};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Scene-space pixel coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

impl Point {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i16, dy: i16) -> Self {
        Self::new(self.x.wrapping_add(dx), self.y.wrapping_add(dy))
    }

    pub fn distance_squared(self, other: Point) -> i32 {
        let dx = self.x as i32 - other.x as i32;
        let dy = self.y as i32 - other.y as i32;
        dx * dx + dy * dy
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Walkability and depth lookup supplied by the scene's resource layer.
pub trait PriorityOracle {
    /// Raw band at a pixel. Zero is unwalkable; negative means no data.
    fn priority_at(&self, x: i32, y: i32) -> i16;
}

/// Row-major band grid. Pixels off the stage read as band 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityMap {
    width: i32,
    height: i32,
    bands: Vec<i16>,
}

impl PriorityMap {
    pub fn new(width: u16, height: u16, bands: Vec<i16>) -> Self {
        debug_assert_eq!(bands.len(), width as usize * height as usize);
        Self {
            width: width as i32,
            height: height as i32,
            bands,
        }
    }

    pub fn uniform(width: u16, height: u16, band: i16) -> Self {
        Self::new(width, height, vec![band; width as usize * height as usize])
    }
}

impl PriorityOracle for PriorityMap {
    fn priority_at(&self, x: i32, y: i32) -> i16 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        self.bands
            .get((y * self.width + x) as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Fixed table of route points. Unused slots carry `x == -1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaypointTable {
    slots: [(i16, i16); WAYPOINT_SLOTS],
}

impl Default for WaypointTable {
    fn default() -> Self {
        Self {
            slots: [(UNUSED_WAYPOINT, UNUSED_WAYPOINT); WAYPOINT_SLOTS],
        }
    }
}

impl WaypointTable {
    pub fn from_slots(slots: [(i16, i16); WAYPOINT_SLOTS]) -> Self {
        Self { slots }
    }

    pub fn from_points(points: &[Point]) -> Self {
        let mut table = Self::default();
        for (slot, point) in table.slots.iter_mut().zip(points) {
            *slot = (point.x, point.y);
        }
        table
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// True when no slot is in use.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Checked lookup for callers outside the planner.
    pub fn get(&self, index: u16) -> Result<Point> {
        let (x, y) = *self
            .slots
            .get(index as usize)
            .ok_or(EngineError::WaypointOutOfRange(index))?;
        if x == UNUSED_WAYPOINT {
            return Err(EngineError::WaypointUnused(index));
        }
        Ok(Point::new(x, y))
    }

    /// Used slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Point)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, (x, _))| *x != UNUSED_WAYPOINT)
            .map(|(index, (x, y))| (index, Point::new(*x, *y)))
    }
}

/// The read-only half of the world: stage bounds, priority oracle and
/// waypoints.
pub struct Scene {
    pub id: u16,
    width: i32,
    height: i32,
    oracle: Box<dyn PriorityOracle>,
    pub waypoints: WaypointTable,
}

impl Scene {
    pub fn new<O>(id: u16, width: u16, height: u16, oracle: O, waypoints: WaypointTable) -> Self
    where
        O: PriorityOracle + 'static,
    {
        Self {
            id,
            width: width as i32,
            height: height as i32,
            oracle: Box::new(oracle),
            waypoints,
        }
    }

    pub fn from_description(description: &SceneDescription) -> Self {
        let map = PriorityMap::new(
            description.width,
            description.height,
            description.priority_bands(),
        );
        Self::new(
            description.scene_id,
            description.width,
            description.height,
            map,
            WaypointTable::from_slots(description.waypoint_table()),
        )
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        let (x, y) = (point.x as i32, point.y as i32);
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn raw_priority(&self, x: i32, y: i32) -> i16 {
        self.oracle.priority_at(x, y)
    }

    /// Band used for walkability: negative readings count as band 1.
    pub fn band_at(&self, x: i32, y: i32) -> i16 {
        let raw = self.raw_priority(x, y);
        if raw < 0 {
            1
        } else {
            raw
        }
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("waypoints", &self.waypoints.iter().count())
            .finish_non_exhaustive()
    }
}
