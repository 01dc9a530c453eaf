//! Syndication feed parsing and normalization.
//!
//! See [`feed`] for the engine and [`config`] for the optional TOML settings
//! used by the `pull` binary.

pub mod config;
pub mod feed;
