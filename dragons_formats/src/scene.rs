use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Waypoint slots a scene may carry. Slots past the description's list are
/// unused.
pub const WAYPOINT_SLOTS: usize = 34;

/// Sentinel x coordinate of an unused waypoint slot.
pub const UNUSED_WAYPOINT: i16 = -1;

/// Hand-authored stand-in for a decoded scene: stage size, the priority map
/// and the waypoint table, plus optional per-object scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub scene_id: u16,
    pub width: u16,
    pub height: u16,
    #[serde(default)]
    pub priority: PriorityLayout,
    /// `null` entries keep a slot unused while later slots are populated.
    #[serde(default)]
    pub waypoints: Vec<Option<[i16; 2]>>,
    #[serde(default)]
    pub objects: Vec<ObjectDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriorityLayout {
    /// Rectangles painted in order over a uniform band.
    Rects {
        default: i16,
        #[serde(default)]
        rects: Vec<PriorityRect>,
    },
    /// One row per scanline, `width` bands per row.
    Grid { rows: Vec<Vec<i16>> },
}

impl Default for PriorityLayout {
    fn default() -> Self {
        PriorityLayout::Rects {
            default: 1,
            rects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub band: i16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescription {
    pub id: u16,
    /// Defaults to the owning scene.
    #[serde(default)]
    pub scene_id: Option<u16>,
    /// Frames until the object's script fires; negative disables the timer.
    #[serde(default = "default_counter")]
    pub counter: i16,
    /// Raw script buffer as a JSON byte array.
    #[serde(default)]
    pub script: Option<Vec<u8>>,
}

fn default_counter() -> i16 {
    -1
}

impl SceneDescription {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let scene: SceneDescription =
            serde_json::from_str(text).context("parsing scene description JSON")?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scene description {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("loading scene description {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width > 0 && self.height > 0,
            "scene {} has an empty stage ({}x{})",
            self.scene_id,
            self.width,
            self.height
        );
        ensure!(
            self.waypoints.len() <= WAYPOINT_SLOTS,
            "scene {} lists {} waypoints, at most {WAYPOINT_SLOTS} slots exist",
            self.scene_id,
            self.waypoints.len()
        );
        for (index, point) in self.waypoints.iter().enumerate() {
            if let Some([x, _]) = point {
                ensure!(
                    *x != UNUSED_WAYPOINT,
                    "waypoint {index} uses the unused-slot sentinel x={UNUSED_WAYPOINT}"
                );
            }
        }
        if let PriorityLayout::Grid { rows } = &self.priority {
            ensure!(
                rows.len() == self.height as usize,
                "priority grid has {} rows, stage height is {}",
                rows.len(),
                self.height
            );
            for (y, row) in rows.iter().enumerate() {
                ensure!(
                    row.len() == self.width as usize,
                    "priority grid row {y} has {} columns, stage width is {}",
                    row.len(),
                    self.width
                );
            }
        }
        Ok(())
    }

    /// Row-major priority bands covering the whole stage.
    pub fn priority_bands(&self) -> Vec<i16> {
        let width = self.width as usize;
        let height = self.height as usize;
        match &self.priority {
            PriorityLayout::Rects { default, rects } => {
                let mut bands = vec![*default; width * height];
                for rect in rects {
                    let x_end = (rect.x as usize + rect.width as usize).min(width);
                    let y_end = (rect.y as usize + rect.height as usize).min(height);
                    for y in (rect.y as usize)..y_end {
                        for x in (rect.x as usize)..x_end {
                            bands[y * width + x] = rect.band;
                        }
                    }
                }
                bands
            }
            PriorityLayout::Grid { rows } => rows.iter().flatten().copied().collect(),
        }
    }

    /// Fixed-size waypoint table; unused slots carry the sentinel x.
    pub fn waypoint_table(&self) -> [(i16, i16); WAYPOINT_SLOTS] {
        let mut table = [(UNUSED_WAYPOINT, UNUSED_WAYPOINT); WAYPOINT_SLOTS];
        for (slot, point) in table.iter_mut().zip(self.waypoints.iter()) {
            if let Some([x, y]) = point {
                *slot = (*x, *y);
            }
        }
        table
    }
}
