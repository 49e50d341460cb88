//! League administration backend: players, events, standings and match
//! scores over a document store, with images in a blob store.

pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod gcp;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod validation;

pub use routes::{app, HttpOptions};
pub use state::AppState;
