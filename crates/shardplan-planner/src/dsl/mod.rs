//! Plan description formats.

pub mod yaml;
