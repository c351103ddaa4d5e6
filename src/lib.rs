//! # stacks
//!
//! Canonical library-tree management with filename healing for
//! hierarchical content vaults.
//!
//! A vault is any folder/file store with create/rename/trash primitives
//! and a raw change-event stream. Inside it, `stacks` maintains a
//! canonical "library" hierarchy in which every leaf's tree position is
//! redundantly encoded in its filename as a reversed ancestor-chain
//! suffix (`Note-soup-recipes`). When the physical layout drifts out of
//! band, events are normalized, classified as renames or moves, and
//! healed back to canonical form while per-section index files
//! ("codexes") are regenerated.
//!
//! The pipeline, in dependency order: [`naming`] encodes and decodes the
//! suffix grammar; [`tree`] holds the derived hierarchy; [`events`]
//! normalizes raw bursts and scopes them to the library root;
//! [`translate`] maps root events to tree mutations; [`heal`] turns a
//! mutation plus the observed physical state into corrective
//! [`vault::VaultAction`]s; [`dispatch`] orders and executes them;
//! [`tracker`] and [`queue`] keep our own writes from re-entering the
//! pipeline; [`library`] wires it all behind one facade and [`watch`]
//! feeds it bursts.

pub mod codex;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod heal;
pub mod library;
pub mod logging;
pub mod naming;
pub mod queue;
pub mod scan;
pub mod tracker;
pub mod translate;
pub mod tree;
pub mod vault;
pub mod watch;

pub use config::LibraryConfig;
pub use error::{LibraryError, NamingError, VaultError};
pub use library::{BurstSummary, Library};
pub use watch::WatchRuntime;
