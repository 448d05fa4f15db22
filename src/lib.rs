// src/lib.rs

pub mod core;
pub mod logging;
