pub mod config;
pub mod error;
pub mod registry;
pub mod residency;
pub mod routes;
pub mod schemas;
pub mod service;
pub mod storage;
pub mod worker;

pub use config::Config;
pub use service::{Studio, SubmitRequest};
