// src/services/mod.rs

pub mod comment;
