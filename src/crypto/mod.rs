//! Cryptographic primitives for validation requests.

pub mod signing;
