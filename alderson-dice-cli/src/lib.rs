//! Operator tooling for Alderson Dice deployments.
//!
//! Loads per-chain deployment settings, pages contract events over public
//! RPC endpoints and renders decoded values for the `alderson-dice` binary.

pub mod config;
pub mod display;
pub mod events;
