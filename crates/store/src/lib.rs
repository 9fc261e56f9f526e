//! Server-side chunk store.
//!
//! The [`ResumeCoordinator`] keeps one partial directory per upload
//! name under `<root>/chunks/` and merged artifacts under
//! `<root>/files/`:
//!
//! ```text
//! <root>/
//!   files/
//!     movie.mkv
//!   chunks/
//!     backup.tar/
//!       .meta.json
//!       0
//!       1
//!       2.5f0c...part
//! ```
//!
//! [`LocalBackend`] plugs a coordinator into a
//! [`TransferSession`](ferryload_transfer::TransferSession) without a
//! network in between.

mod config;
mod coordinator;
mod error;
mod local;
mod validation;

pub use config::{
    DEFAULT_ARTIFACTS_DIR, DEFAULT_PARTIALS_DIR, META_FILE, STAGING_SUFFIX, StoreConfig,
};
pub use coordinator::{MergeOutcome, ResumeCoordinator};
pub use error::StoreError;
pub use local::LocalBackend;
pub use validation::validate_file_name;
