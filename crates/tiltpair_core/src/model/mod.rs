//! Tilt-pair domain model.
//!
//! # Responsibility
//! - Define micrograph pairs, their particle picks and the picking family.
//! - Keep correspondence between untilted and tilted picks index-based.
//!
//! # Invariants
//! - The picker's micrograph list is the only owner of pair state.
//! - Cross references (tilted → untilted) are indices, never shared owners.

pub mod family;
pub mod micrograph;
pub mod particle;
