//! `hostfs`: one substitutable interface over host filesystem primitives.
//!
//! - `io`     : the [`Filesystem`] trait, [`LocalFs`] (host) and [`MemFs`] (in-memory)
//! - `tree`   : recursive directory removal shared by all implementations
//! - `mime`   : injectable MIME detection
//! - `config` : runtime configuration
//! - `error`  : [`FsError`]

pub mod config;
pub mod error;
pub mod io;
pub mod mime;
pub mod tree;
pub mod util;

pub use config::{FsConfig, RmdirPolicy};
pub use error::{FsError, Result};
pub use io::fs::LocalFs;
pub use io::memfs::MemFs;
pub use io::Filesystem;
pub use mime::{MimeDetector, SniffMimeDetector};
