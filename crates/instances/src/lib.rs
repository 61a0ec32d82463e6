//! Instance Data Model: the per-instance parameter stack and its derived transforms.
//!
//! Attributes are stored as sibling arrays (structure-of-arrays) so each one
//! is a contiguous, upload-ready buffer.
//!
//! # Invariants
//! - Every attribute array has exactly `len()` entries; index `i` across all
//!   arrays describes instance `i`.
//! - The host transform buffer exists only in host-computed mode and always
//!   matches the stack length.
//! - Host, per-draw and device transforms evaluate the same formula.

mod stack;
mod transform;

pub use stack::{InstanceError, InstanceId, InstanceRecord, InstanceStack};
pub use transform::{HostTransforms, InstanceModel, TRANSFORM_FLOATS, spin_transform};
