//! Action packages
//!
//! An init request carries the action as a base64-encoded zip. The module
//! library named by the first part of `main` must sit at the top level of the
//! archive:
//! ```text
//! package.zip
//! ├── libecho_action.so     # Module "echo_action" (Linux)
//! └── assets/               # anything else the action reads at runtime
//! ```

pub mod unpack;

use std::path::{Path, PathBuf};

pub use unpack::BundleUnpacker;

/// Find a module file directly under the extraction directory
pub fn locate_module(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let path = dir.join(file_name);
    path.is_file().then_some(path)
}
