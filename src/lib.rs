// src/lib.rs

//! Copira Harvester Library

pub mod discovery;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod utils;
