//! pipeconf-store: versioned history of the primary pipeline configuration
//!
//! Every accepted revision of the configuration text is a commit on the main
//! line of a private git repository. The store offers:
//!
//! - checkin keyed by a caller-supplied content hash (no-op when unchanged)
//! - lookup by hash or `"current"`, paginated history, and diffs
//! - three-way merge of a stale edit with the latest revision on an
//!   ephemeral branch that never outlives the call
//! - garbage collection and a loose-object health signal

pub mod diff;
pub mod error;
pub mod git;
pub mod handle;
pub mod health;
pub mod revision;
pub mod scratch;
pub mod settings;
pub mod store;

pub use error::{StoreError, CONFIG_CHANGED_PLEASE_REFRESH};
pub use git::{MAIN_BRANCH, MAIN_REF};
pub use handle::SharedConfigStore;
pub use health::{GcHealth, LooseObjectMonitor};
pub use revision::{content_hash, ConfigRevision};
pub use scratch::is_scratch_branch;
pub use settings::StoreSettings;
pub use store::{ConfigStore, CONFIG_FILE_NAME, CURRENT};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
