use log::{debug, info};

use crate::actor::ActorId;
use crate::error::Result;
use crate::flags::EngineFlags;
use crate::frame::{FrameLoop, FramePacer, NoopPacer};
use crate::host::EngineHost;
use crate::path::WalkMode;
use crate::scene::Point;
use crate::script::{ScriptInterpreter, ScriptOpCall};
use crate::state_machine;
use crate::world::World;

/// The world plus the frame handler and pacing that drive it.
pub struct Engine {
    pub world: World,
    frame_loop: FrameLoop,
    pacer: Box<dyn FramePacer>,
}

impl Engine {
    pub fn new(world: World) -> Self {
        Self::with_pacer(world, Box::new(NoopPacer))
    }

    pub fn with_pacer(world: World, pacer: Box<dyn FramePacer>) -> Self {
        Self {
            world,
            frame_loop: FrameLoop::new(),
            pacer,
        }
    }

    /// Paces, advances and presents one frame.
    pub fn step_frame(&mut self, host: &mut dyn EngineHost) -> Result<()> {
        self.pacer.wait();
        self.frame_loop.tick(&mut self.world, host)?;
        host.present_frame(&self.world);
        Ok(())
    }

    /// Runs up to `frames` frames, stopping early once scripts are aborted.
    /// Returns the number of frames that ran.
    pub fn wait_for_frames(&mut self, frames: u16, host: &mut dyn EngineHost) -> Result<u16> {
        self.pump(frames, false, host)
    }

    /// Like [`Engine::wait_for_frames`], but the host can also skip the wait.
    pub fn wait_for_frames_allow_skip(
        &mut self,
        frames: u16,
        host: &mut dyn EngineHost,
    ) -> Result<u16> {
        self.pump(frames, true, host)
    }

    fn pump(&mut self, frames: u16, allow_skip: bool, host: &mut dyn EngineHost) -> Result<u16> {
        for ran in 0..frames {
            if self.world.flags.contains(EngineFlags::ABORT_SCRIPTS) {
                debug!("wait cut short after {ran} frames: scripts aborted");
                return Ok(ran);
            }
            if allow_skip && host.skip_requested() {
                debug!("wait skipped after {ran} frames");
                return Ok(ran);
            }
            self.step_frame(host)?;
        }
        Ok(frames)
    }

    pub fn request_walk(&mut self, id: ActorId, target: Point, mode: WalkMode) -> Result<bool> {
        state_machine::request_walk(&mut self.world, id, target, mode)
    }

    /// Runs a script buffer to completion or to its first stop, returning the
    /// final result word.
    pub fn run_script(&mut self, code: &[u8], host: &mut dyn EngineHost) -> Result<u16> {
        let mut call = ScriptOpCall::new(code);
        ScriptInterpreter::new().run(self, host, &mut call)?;
        Ok(call.result)
    }

    /// Runs the scripts of every object whose counter expired. Returns how many
    /// ran.
    pub fn run_pending_object_scripts(&mut self, host: &mut dyn EngineHost) -> Result<usize> {
        let pending = self.world.objects.take_pending();
        for &id in &pending {
            let script = self.world.objects.script(id)?;
            info!("running script of object {id}");
            let mut call = ScriptOpCall::new(&script);
            ScriptInterpreter::new().run(self, host, &mut call)?;
        }
        Ok(pending.len())
    }
}
