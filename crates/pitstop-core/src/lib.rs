pub mod achievements;
pub mod advisor;
pub mod assistant;
pub mod config;
pub mod error;
pub mod fixture;
pub mod io;
pub mod metrics;
pub mod model;
pub mod paths;
pub mod report;
pub mod rules;
pub mod source;
pub mod store;
pub mod tracker;
pub mod types;

pub use error::{PitstopError, Result};
