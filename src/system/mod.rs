//! # System Interaction Layer
//!
//! Boundary between the launcher's logic and the operating system.
//!
//! ## Modules
//!
//! - **`environment`**: `ProcessEnvironment`, the explicit copy of the process environment
//!   that the launcher mutates and hands to the child, with snapshot/restore support.
//! - **`executor`**: spawns the inference process with a given environment and captures the
//!   output of short diagnostic commands.
//! - **`probe`**: the `EnvironmentProbe` contract and its interpreter-backed implementation
//!   (runtime/GPU status, tool and package availability).

pub mod environment;
pub mod executor;
pub mod probe;
