//! DB-compatible (e.g. de/serialisable) types, and the operations on them.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Maps keyed by ID are stored with hex string keys.

pub mod assignment;
pub mod attendance;
pub mod form;
pub mod group;
pub mod response;
