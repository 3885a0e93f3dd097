//! Leadscout command line front end.
//!
//! Split from main.rs so configuration, logging and rendering can be tested.

pub mod config;
pub mod logging;
pub mod render;
