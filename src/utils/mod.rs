// src/utils/mod.rs

pub mod clock;
pub mod format;
pub mod html;
