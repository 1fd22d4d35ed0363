pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod services;

pub use error::Error;
