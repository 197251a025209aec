//! Collectors for host metrics that back the built-in limits and the
//! system information message.
//!
//! Load average and memory come from `crate::system`; mounted filesystems
//! and NVIDIA GPUs are read here.

pub mod filesystem;
pub mod gpu;
