//! API middleware.

pub mod identity;
