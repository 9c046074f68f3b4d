//! Access policy over the current entitlement.

pub mod access;
