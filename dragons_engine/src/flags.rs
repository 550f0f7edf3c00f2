use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::Serialize;

macro_rules! flag_word {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn from_bits(bits: $repr) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            /// True when every bit of `other` is set.
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }
    };
}

flag_word! {
    /// Per-actor flag word. Bits without a named constant belong to the
    /// renderer and are carried through untouched.
    ActorFlags(u16)
}

impl ActorFlags {
    /// The sequence changed; its instruction pointer restarts on the next turn.
    pub const RESET_SEQUENCE: Self = Self(0x0001);
    pub const FRAME_DIRTY: Self = Self(0x0002);
    pub const AT_REST: Self = Self(0x0004);
    /// Scratch bit owned by sequence code, dropped on every sequence restart.
    pub const SEQUENCE_SCRATCH: Self = Self(0x0008);
    pub const WALKING: Self = Self(0x0010);
    pub const IN_USE: Self = Self(0x0040);
    /// Keeps the priority layer from following the priority map.
    pub const PRIORITY_FROZEN: Self = Self(0x0100);
    /// Position is in screen space; facing overrides survive arrival.
    pub const SCREEN_SPACE: Self = Self(0x0200);
    pub const HIDDEN: Self = Self(0x0400);
    /// The facing point was set by a caller and must not follow the walk target.
    pub const FACE_TARGET: Self = Self(0x0800);
    pub const LOOP_HALTED: Self = Self(0x1000);
    /// Walking keeps the current sequence instead of deriving one from the slope.
    pub const SEQUENCE_LOCKED: Self = Self(0x2000);
    /// Freezes the actor in place: no walk steps and no sequence turns.
    pub const PAUSED: Self = Self(0x8000);

    /// Bits a sequence restart clears.
    pub const RESTART_MASK: Self = Self(0x0001 | 0x0008 | 0x1000);
}

flag_word! {
    /// Engine-wide flag word.
    EngineFlags(u32)
}

impl EngineFlags {
    pub const ACTORS_ENABLED: Self = Self(0x0000_0004);
    /// Leaves slots 0 and 1 out of the sequence scan.
    pub const SKIP_PLAYER_SLOTS: Self = Self(0x0000_0040);
    /// Scan all 64 slots instead of the 23 base slots.
    pub const EXTENDED_ACTOR_RANGE: Self = Self(0x0000_0080);
    pub const FAST_FORWARD_ALLOWED: Self = Self(0x0008_0000);
    pub const ABORT_SCRIPTS: Self = Self(0x0010_0000);
}

flag_word! {
    /// Flag word of a scene object record.
    ObjectFlags(u16)
}

impl ObjectFlags {
    /// The object's counter ran out; its script runs on the next pending pass.
    pub const SCRIPT_PENDING: Self = Self(0x0001);
    pub const DISABLED: Self = Self(0x0002);
}
