//! Process-wide on-disk locations: the user and CLI homes, and the package store layout.

pub mod cache;
pub mod utils;
