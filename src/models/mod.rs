// src/models/mod.rs

pub mod attempt;
pub mod quiz;
pub mod report;
pub mod session;
pub mod violation;
