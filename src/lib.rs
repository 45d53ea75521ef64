// src/lib.rs

//! NuSearch Harvester Library

pub mod dump;
pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod utils;
