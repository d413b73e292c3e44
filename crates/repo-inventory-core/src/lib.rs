//! # Repo Inventory Core
//!
//! Shared, I/O-free logic for Repo Inventory: record models, the filter
//! expression language, and the remote source traits.
//!
//! This crate performs no network or filesystem access. The root
//! `repo-inventory` crate supplies the GitHub-backed sources, the cache and
//! the CLI; tests and embedders can use the in-memory sources in
//! [`source::memory`].

pub mod errors;
pub mod expr;
pub mod filter;
pub mod models;
pub mod source;
