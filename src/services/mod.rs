// src/services/mod.rs

pub mod api;
pub mod deadline;
#[cfg(test)]
pub(crate) mod fake;
pub mod notice;
pub mod player;
pub mod proctor;
pub mod signals;
pub mod sync;
pub mod timer;
