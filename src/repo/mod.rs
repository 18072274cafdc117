// src/repo/mod.rs

pub mod comment;
pub mod user;
