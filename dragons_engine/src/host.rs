use anyhow::Result;
use log::warn;
use serde::Serialize;

use crate::actor::ActorId;
use crate::world::World;

/// Geometry of a decoded animation frame. The core never sees pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameGeometry {
    pub width: u16,
    pub height: u16,
    pub origin_x: i16,
    pub origin_y: i16,
}

/// Collaborators outside the core: resources, audio, presentation and input.
/// Every hook has a do-nothing default so headless runs only override what
/// they observe.
pub trait EngineHost {
    fn play_or_stop_sound(&mut self, _sound_id: u16) {}

    fn load_frame(&mut self, _actor: ActorId, _frame_offset: u16) -> FrameGeometry {
        FrameGeometry::default()
    }

    fn load_scene(&mut self, _world: &mut World, scene_id: u16) -> Result<()> {
        warn!("host has no scene loader; ignoring load of scene {scene_id}");
        Ok(())
    }

    fn run_special_opcode(&mut self, _world: &mut World, opcode: u16) -> Result<()> {
        warn!("host has no special opcode {opcode:#x}");
        Ok(())
    }

    fn present_frame(&mut self, _world: &World) {}

    /// Polled by skippable waits.
    fn skip_requested(&mut self) -> bool {
        false
    }

    /// Polled by the script loop while fast-forward is allowed.
    fn fast_forward_pressed(&mut self) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl EngineHost for NullHost {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostEvent {
    Sound { sound_id: u16 },
    FrameLoaded { actor: ActorId, frame_offset: u16 },
    SceneLoad { scene_id: u16 },
    SpecialOpcode { opcode: u16 },
    FramePresented { frame: u64 },
}

/// Host that records every call, with scripted skip and fast-forward input.
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    pub(crate) events: Vec<HostEvent>,
    /// Report a skip request once this many frames have been presented.
    pub skip_after_frames: Option<usize>,
    /// Report fast-forward once this many frames have been presented.
    pub fast_forward_after_frames: Option<usize>,
    pub(crate) presented: usize,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn presented_frames(&self) -> usize {
        self.presented
    }

    pub fn sounds(&self) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|event| match event {
                HostEvent::Sound { sound_id } => Some(*sound_id),
                _ => None,
            })
            .collect()
    }
}

impl EngineHost for RecordingHost {
    fn play_or_stop_sound(&mut self, sound_id: u16) {
        self.events.push(HostEvent::Sound { sound_id });
    }

    fn load_frame(&mut self, actor: ActorId, frame_offset: u16) -> FrameGeometry {
        self.events.push(HostEvent::FrameLoaded {
            actor,
            frame_offset,
        });
        FrameGeometry {
            width: 16,
            height: 32,
            origin_x: 8,
            origin_y: 31,
        }
    }

    fn load_scene(&mut self, world: &mut World, scene_id: u16) -> Result<()> {
        self.events.push(HostEvent::SceneLoad { scene_id });
        world.scene.id = scene_id;
        Ok(())
    }

    fn run_special_opcode(&mut self, _world: &mut World, opcode: u16) -> Result<()> {
        self.events.push(HostEvent::SpecialOpcode { opcode });
        Ok(())
    }

    fn present_frame(&mut self, world: &World) {
        self.presented += 1;
        self.events.push(HostEvent::FramePresented { frame: world.frame });
    }

    fn skip_requested(&mut self) -> bool {
        self.skip_after_frames
            .is_some_and(|frames| self.presented >= frames)
    }

    fn fast_forward_pressed(&mut self) -> bool {
        self.fast_forward_after_frames
            .is_some_and(|frames| self.presented >= frames)
    }
}
