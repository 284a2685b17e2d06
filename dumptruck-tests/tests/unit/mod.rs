//! Unit tests for dumptruck
//!
//! Configuration loading, retention and source resolution through the public API.

mod config;
mod resolver;
mod retention;
