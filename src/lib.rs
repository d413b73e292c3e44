//! # Repo Inventory
//!
//! Tabular inventories of a GitHub account: its repositories, the file trees
//! of those repositories at their default branches, and the text of the
//! files in them. No local checkout is made; everything is read through the
//! REST API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌─────────────┐   ┌────────────┐
//! │ Repositories │──▶│ Repo filter │──▶│ Tree walker │──▶│  Content   │
//! │ cache / API  │   │  (expr)     │   │ glob + size │   │   reader   │
//! └──────────────┘   └─────────────┘   └─────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rinv acme                              # list repositories
//! rinv acme -f '{stars} > 10'            # filtered listing
//! rinv acme -w --pattern '**/*.toml'     # walk file trees
//! rinv acme -x --max-size-mb 1 -o ndjson # read file contents
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and token resolution |
//! | [`inventory`] | Repository retrieval with cache fallback |
//! | [`cache`] | Per-account repository cache |
//! | [`github`] | GitHub REST sources |
//! | [`walk`] | Tree walker |
//! | [`extract`] | Content reader |
//! | [`output`] | Table, CSV and JSON rendering |
//!
//! Filter expressions, record types, the source traits and the error types
//! live in `repo-inventory-core` and are re-exported here.

pub mod cache;
pub mod config;
pub mod extract;
pub mod github;
pub mod inventory;
pub mod output;
pub mod walk;

pub use repo_inventory_core::{errors, expr, filter, models, source};

/// Directory name used under the user cache and config directories.
pub const APP_NAME: &str = "repo-inventory";

pub use inventory::{Inventory, InventoryBuilder, RetrievalMode};
pub use walk::WalkOptions;
