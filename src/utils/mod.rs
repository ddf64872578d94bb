// src/utils/mod.rs

//! Utility functions and helpers.

pub mod url;

pub use url::{extract_item_id, normalize, resolve};
