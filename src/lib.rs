pub mod auth;
pub mod chat;
pub mod config;
pub mod corpus;
pub mod database;
pub mod error;
pub mod export;
pub mod migrate;
pub mod models;
pub mod store;
pub mod web;

pub use database::Database;
pub use error::{AppError, Result};
