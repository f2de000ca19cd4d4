//! Lead generation scrape queue
//!
//! Accepts scrape requests over HTTP, runs them on a bounded pool of
//! background workers against a headless-browser map search, and exposes
//! pollable job state.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
