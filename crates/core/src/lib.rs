#![deny(warnings)]

pub mod config;
pub mod history;
pub mod mood;
pub mod reasoning;
pub mod stats;
pub mod trend;
pub mod util;
