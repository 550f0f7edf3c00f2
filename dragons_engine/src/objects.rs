use std::rc::Rc;

use anyhow::Result;
use dragons_formats::SceneDescription;
use log::debug;

use crate::error::ScriptError;
use crate::flags::ObjectFlags;

/// A scene object with a countdown and an optional script.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub id: u16,
    pub scene_id: u16,
    /// Frames until the script fires; negative when idle.
    pub counter: i16,
    pub flags: ObjectFlags,
    script: Option<Rc<[u8]>>,
}

impl ObjectRecord {
    pub fn new(id: u16, scene_id: u16, counter: i16, script: Option<Vec<u8>>) -> Self {
        Self {
            id,
            scene_id,
            counter,
            flags: ObjectFlags::empty(),
            script: script.map(Rc::from),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ObjectTable {
    records: Vec<ObjectRecord>,
}

impl ObjectTable {
    pub fn new(records: Vec<ObjectRecord>) -> Self {
        Self { records }
    }

    pub fn from_description(description: &SceneDescription) -> Self {
        let mut records = Vec::with_capacity(description.objects.len());
        for object in &description.objects {
            records.push(ObjectRecord::new(
                object.id,
                object.scene_id.unwrap_or(description.scene_id),
                object.counter,
                object.script.clone(),
            ));
        }
        Self::new(records)
    }

    pub fn get(&self, id: u16) -> Option<&ObjectRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut ObjectRecord> {
        self.records.iter_mut().find(|record| record.id == id)
    }

    /// Shared handle on an object's script so it can run while the table is
    /// borrowed mutably.
    pub fn script(&self, id: u16) -> Result<Rc<[u8]>, ScriptError> {
        self.get(id)
            .and_then(|record| record.script.clone())
            .ok_or(ScriptError::MissingObjectScript(id))
    }

    /// Counts down the running counters of objects in `scene_id`.
    pub fn tick(&mut self, scene_id: u16) {
        for record in &mut self.records {
            if record.counter < 0 || record.scene_id != scene_id {
                continue;
            }
            record.counter -= 1;
            if record.counter < 0 {
                debug!("object {} counter expired", record.id);
                record.flags.insert(ObjectFlags::SCRIPT_PENDING);
            }
        }
    }

    /// Clears and returns the ids of objects whose script is due.
    pub fn take_pending(&mut self) -> Vec<u16> {
        let mut pending = Vec::new();
        for record in &mut self.records {
            if record.flags.contains(ObjectFlags::SCRIPT_PENDING) {
                record.flags.remove(ObjectFlags::SCRIPT_PENDING);
                if !record.flags.contains(ObjectFlags::DISABLED) {
                    pending.push(record.id);
                }
            }
        }
        pending
    }
}
