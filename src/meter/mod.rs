//! Ticket usage metering and per-user rate limiting.

pub mod rate_limit;
pub mod usage;
