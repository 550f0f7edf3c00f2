pub mod actor_resource;
pub mod bytecode;
pub mod scene;

pub use actor_resource::ActorResource;
pub use bytecode::{HEADER_LEN, Instruction, InstructionIter, Operands, ProgramBuilder};
pub use scene::{
    ObjectDescription, PriorityLayout, PriorityRect, SceneDescription, UNUSED_WAYPOINT,
    WAYPOINT_SLOTS,
};
