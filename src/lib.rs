//! The _preflight_ library crate.
//!
//! Manages the cluster-internal certificate authority and tracks how far
//! each node got in obtaining its TLS identity before the cluster goes
//! live.

pub mod ca;
pub mod cli;
pub mod commons;
pub mod config;
pub mod constants;
pub mod keystore;
pub mod preflight;
pub mod provisioning;

#[cfg(test)]
pub mod test;
