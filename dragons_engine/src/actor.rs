use std::rc::Rc;

use dragons_formats::ActorResource;

use crate::fixed::{self, Fixed};
use crate::flags::ActorFlags;
use crate::host::FrameGeometry;
use crate::scene::Point;
use crate::state_machine::WalkState;

pub type ActorId = u16;

/// Entries the walk-point stack can hold.
pub const WALK_STACK_CAPACITY: usize = 32;
/// One pixel per tick before frame compensation.
pub const DEFAULT_WALK_SPEED: i32 = 0x10000;
/// Scale of 100%.
pub const SCALE_IDENTITY: i32 = 256;
/// `target_sequence_id` value meaning "derive the idle sequence from facing".
pub const NO_SEQUENCE: i16 = -1;

/// One slot of the actor pool. Slots are recycled, never dropped.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: ActorId,
    pub flags: ActorFlags,
    pub position: Point,
    /// Sub-target the walk driver is integrating toward.
    pub target: Point,
    /// Final destination behind the waypoint stack.
    pub queued_target: Option<Point>,
    /// Per-tick 16.16 step before scale and frame compensation.
    pub slope_x: i32,
    pub slope_y: i32,
    pub x_fixed: Fixed,
    pub y_fixed: Fixed,
    pub walk_points: [u8; WALK_STACK_CAPACITY],
    /// Top of `walk_points`, `-1` when empty.
    pub walk_points_index: i16,
    pub priority_layer: i16,
    pub sequence_id: i16,
    /// Sequence to play on arrival instead of the derived idle one.
    pub target_sequence_id: i16,
    pub walk_speed: i32,
    pub scale: i32,
    pub sequence_timer: u16,
    pub sequence_timer_start: u16,
    pub sequence_ip: usize,
    pub frame_offset: u16,
    pub frame: Option<FrameGeometry>,
    pub user_word: i16,
    /// Point the actor turns toward when it comes to rest.
    pub facing_point: Point,
    pub walk_state: WalkState,
    pub resource: Option<Rc<ActorResource>>,
}

impl Actor {
    pub fn new(id: ActorId) -> Self {
        Self {
            id,
            flags: ActorFlags::empty(),
            position: Point::default(),
            target: Point::default(),
            queued_target: None,
            slope_x: 0,
            slope_y: 0,
            x_fixed: 0,
            y_fixed: 0,
            walk_points: [0; WALK_STACK_CAPACITY],
            walk_points_index: -1,
            priority_layer: 0,
            sequence_id: 0,
            target_sequence_id: NO_SEQUENCE,
            walk_speed: DEFAULT_WALK_SPEED,
            scale: SCALE_IDENTITY,
            sequence_timer: 0,
            sequence_timer_start: 0,
            sequence_ip: 0,
            frame_offset: 0,
            frame: None,
            user_word: 0,
            facing_point: Point::default(),
            walk_state: WalkState::Idle,
            resource: None,
        }
    }

    /// Returns the slot to its freshly allocated state, keeping its id.
    pub fn reset(&mut self) {
        *self = Self::new(self.id);
    }

    pub fn is_in_use(&self) -> bool {
        self.flags.contains(ActorFlags::IN_USE)
    }

    pub fn is_walking(&self) -> bool {
        self.flags.contains(ActorFlags::WALKING)
    }

    pub fn is_at_rest(&self) -> bool {
        self.flags.contains(ActorFlags::AT_REST)
    }

    /// Moves the actor and resynchronises the fixed-point accumulators.
    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.x_fixed = fixed::from_int(position.x as i32);
        self.y_fixed = fixed::from_int(position.y as i32);
    }

    /// Switches sequence; the interpreter restarts it on the actor's next turn.
    pub fn update_sequence(&mut self, sequence_id: i16) {
        self.sequence_id = sequence_id;
        self.flags.insert(ActorFlags::RESET_SEQUENCE);
        self.flags.remove(ActorFlags::AT_REST);
    }

    pub fn stop_walk(&mut self) {
        self.flags.remove(ActorFlags::WALKING);
        self.flags.insert(ActorFlags::AT_REST);
        self.walk_points_index = -1;
        self.target = self.position;
        self.queued_target = None;
        self.slope_x = 0;
        self.slope_y = 0;
        self.walk_state = WalkState::Idle;
    }

    /// Remaining waypoint indices, bottom of the stack first.
    pub fn walk_stack(&self) -> &[u8] {
        let len = (self.walk_points_index + 1).max(0) as usize;
        &self.walk_points[..len]
    }

    pub fn pop_walk_point(&mut self) -> Option<u8> {
        if self.walk_points_index < 0 {
            return None;
        }
        let index = self.walk_points[self.walk_points_index as usize];
        self.walk_points_index -= 1;
        Some(index)
    }

    /// Whether the sequence interpreter may take a turn on this actor.
    pub fn sequence_turn_due(&self) -> bool {
        self.flags.contains(ActorFlags::IN_USE)
            && !self
                .flags
                .intersects(ActorFlags::AT_REST | ActorFlags::HIDDEN | ActorFlags::PAUSED)
            && self.resource.is_some()
            && (self.sequence_timer == 0 || self.flags.contains(ActorFlags::RESET_SEQUENCE))
    }
}
