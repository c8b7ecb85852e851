pub mod wire;

pub use wire::{Announcement, Request};

pub const DEFAULT_CONTROL_PORT: u16 = 25565;
pub const DEFAULT_DISCOVERY_PORT: u16 = 25566;

/// Join response body when the session has no free slot.
pub const SESSION_FULL_SENTINEL: i32 = -1;

// Discovery datagrams above this size are dropped before sending.
pub const MAX_DATAGRAM_BYTES: usize = 1024;

// Sanity bound on the participant count a snapshot payload may claim.
pub const MAX_WIRE_PARTICIPANTS: usize = 256;
