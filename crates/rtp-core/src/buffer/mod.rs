//! Packet reordering and delivery pacing

pub mod reorder;

pub use reorder::{ReleasedPacket, ReorderBuffer};
