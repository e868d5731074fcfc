// src/core/mod.rs

pub mod cache;
pub mod command_builder;
pub mod launcher;
pub mod parameters;
pub mod paths;
pub mod preflight;
pub mod sanitizer;
