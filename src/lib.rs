pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod tasks;
pub mod voting;

pub use error::{Error, Result};
