//! Actor movement and scripting core of a 2D adventure engine: walk planning
//! over a priority map and waypoint graph, the per-frame walk driver, and the
//! two bytecode interpreters that animate actors and sequence scenes.

pub mod actor;
pub mod cli;
pub mod direction;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod flags;
pub mod frame;
pub mod host;
pub mod line_of_sight;
pub mod objects;
pub mod path;
pub mod pool;
pub mod scene;
pub mod script;
pub mod sequence;
pub mod simulation;
pub mod state_machine;
pub mod walk;
pub mod world;

pub use actor::{Actor, ActorId};
pub use engine::Engine;
pub use error::{EngineError, Result, ScriptError, SequenceError};
pub use flags::{ActorFlags, EngineFlags, ObjectFlags};
pub use host::{EngineHost, NullHost, RecordingHost};
pub use path::WalkMode;
pub use scene::{Point, PriorityMap, PriorityOracle, Scene, WaypointTable};
pub use world::World;
