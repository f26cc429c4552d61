/*!
 * Event Types
 * Interest and readiness bitmasks exchanged with the event loop
 */

use std::ops::{BitOr, BitOrAssign};

/// What a registration wants to be woken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interest(u8);

impl Interest {
    pub const READABLE: Interest = Interest(0b01);
    pub const WRITABLE: Interest = Interest(0b10);

    pub const fn empty() -> Interest {
        Interest(0)
    }

    pub const fn contains(self, other: Interest) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

impl BitOrAssign for Interest {
    fn bitor_assign(&mut self, rhs: Interest) {
        self.0 |= rhs.0;
    }
}

/// What the loop observed on a descriptor when dispatching its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ready(u8);

impl Ready {
    pub const READABLE: Ready = Ready(0b0001);
    pub const WRITABLE: Ready = Ready(0b0010);
    pub const ERROR: Ready = Ready(0b0100);
    pub const HANGUP: Ready = Ready(0b1000);

    pub const fn empty() -> Ready {
        Ready(0)
    }

    pub const fn contains(self, other: Ready) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_readable(self) -> bool {
        self.contains(Ready::READABLE)
    }

    pub const fn is_error(self) -> bool {
        self.contains(Ready::ERROR)
    }
}

impl BitOr for Ready {
    type Output = Ready;

    fn bitor(self, rhs: Ready) -> Ready {
        Ready(self.0 | rhs.0)
    }
}

impl BitOrAssign for Ready {
    fn bitor_assign(&mut self, rhs: Ready) {
        self.0 |= rhs.0;
    }
}
