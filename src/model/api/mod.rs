//! API-friendly types: request bodies and their validation, and the
//! descriptions returned to clients.
//!
//! Datetimes here are RFC 3339 strings rather than MongoDB's own format.

pub mod assignment;
pub mod attendance;
pub mod auth;
pub mod form;
pub mod group;
pub mod response;
