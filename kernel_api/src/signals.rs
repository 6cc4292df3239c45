//! Kernel object signal bits

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Observable state bits of a kernel object
    ///
    /// A wait is satisfied as soon as any requested bit is asserted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Signals: u32 {
        /// Data (or a message) is available to read
        const READABLE    = 1 << 0;
        /// Room is available to write
        const WRITABLE    = 1 << 1;
        /// The other end of a pipe/channel/stream has been closed
        const PEER_CLOSED = 1 << 2;
        /// Generic "object signalled", asserted by processes on exit
        const SIGNALED    = 1 << 3;

        /// Bits userspace may set/clear on an event object
        const USER_0      = 1 << 24;
        const USER_1      = 1 << 25;
        const USER_2      = 1 << 26;
        const USER_3      = 1 << 27;
    }
}

impl Signals {
    /// Mask of the bits `object_signal` may touch
    pub const USER_ALL: Signals = Signals::USER_0
        .union(Signals::USER_1)
        .union(Signals::USER_2)
        .union(Signals::USER_3);
}
