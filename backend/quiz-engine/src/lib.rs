#![allow(dead_code)]

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::EngineConfig;
pub use errors::EngineError;
pub use services::QuizEngine;
