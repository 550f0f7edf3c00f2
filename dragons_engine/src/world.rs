use dragons_formats::SceneDescription;

use crate::error::{EngineError, Result};
use crate::flags::EngineFlags;
use crate::objects::ObjectTable;
use crate::pool::ActorPool;
use crate::scene::Scene;

/// Script variables addressable by the set and test opcodes.
pub const VARIABLE_COUNT: usize = 256;

/// Everything the interpreters and the frame handler read or write. Passed by
/// reference; there is no global engine state.
#[derive(Debug)]
pub struct World {
    pub scene: Scene,
    pub actors: ActorPool,
    pub objects: ObjectTable,
    pub flags: EngineFlags,
    variables: Vec<i16>,
    /// Frames ticked since the world was built.
    pub frame: u64,
}

impl World {
    pub fn new(scene: Scene, objects: ObjectTable) -> Self {
        Self {
            scene,
            actors: ActorPool::new(),
            objects,
            flags: EngineFlags::ACTORS_ENABLED,
            variables: vec![0; VARIABLE_COUNT],
            frame: 0,
        }
    }

    pub fn from_description(description: &SceneDescription) -> Self {
        Self::new(
            Scene::from_description(description),
            ObjectTable::from_description(description),
        )
    }

    pub fn variable(&self, index: u16) -> Result<i16> {
        self.variables
            .get(index as usize)
            .copied()
            .ok_or(EngineError::VariableOutOfRange(index))
    }

    pub fn set_variable(&mut self, index: u16, value: i16) -> Result<()> {
        let slot = self
            .variables
            .get_mut(index as usize)
            .ok_or(EngineError::VariableOutOfRange(index))?;
        *slot = value;
        Ok(())
    }
}
