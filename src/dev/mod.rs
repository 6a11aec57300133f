// src/dev/mod.rs
pub mod generator;
pub mod reference;
