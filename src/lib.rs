//! # magikpod
//!
//! **Control plane of a pod runtime**
//!
//! This crate manages the on-disk side of pods (groups of co-located apps
//! sharing namespaces): it derives pod lifecycle state from directories and
//! locks, keeps image metadata in a content-addressed store with a migrated
//! SQLite schema, and bridges operator commands into a running pod's
//! namespaces. Preparing, booting and collecting pods belong to other
//! subsystems; this crate observes their work through the shared layout.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  magikpod app exec | stop | list                    │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  commands ── Config (data dir, app, insecure options)               │
//! │     │                                                               │
//! │     ├──▶ pod      directory + flock ──▶ PodState, PID 1, apps       │
//! │     ├──▶ store    SQLite (aciinfo, remote) + tree store rootfs      │
//! │     └──▶ enter    NamespaceBridge ──▶ stage1 enter / nsenter        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`pod`]: Pod IDs, state derivation, locking, manifests, enumeration
//! - [`store`]: Image records, tree store paths, schema migration
//! - [`enter`]: Namespace entry helpers and exit status forwarding
//! - [`secflags`]: Insecure option flags
//! - [`commands`]: `app exec`, `app stop`, `app list`
//! - [`config`]: Per-invocation settings
//! - [`constants`]: Layout names and bounds
//! - [`error`]: Error types
//!
//! # Platform
//!
//! Linux only: pods are entered through Linux namespaces and PID 1 is
//! discovered through `/proc`.

pub mod commands;
pub mod config;
pub mod constants;
pub mod enter;
pub mod error;
pub mod pod;
pub mod secflags;
pub mod store;

pub use config::Config;
pub use enter::{EnterRequest, NamespaceBridge, NsenterRequest, Stage0Bridge, forward_exit};
pub use error::{Error, Result};
pub use pod::{Pod, PodDir, PodId, PodState};
pub use secflags::SecFlags;
pub use store::{AciInfo, BlobKey, Store, TreeStoreId};
