//! Entity Chain Registry
//!
//! Owns the lifecycle of department, class and student chains: genesis
//! creation under the right parent, event appends, and reconstruction
//! from the record store.

pub mod entity;
pub mod locks;
pub mod service;

pub use entity::{AttendanceStatus, EntityKind, EntityStatus, EventKind};
pub use service::ChainService;
