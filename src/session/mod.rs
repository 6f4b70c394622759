//! # Session Module
//!
//! Per-session storage lifecycle: the directory-backed artifact store and
//! the TTL retention sweep that reclaims abandoned sessions.

pub mod store;
pub mod sweep;
