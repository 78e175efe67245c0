//! On-disk state of the watermark bot.
//!
//! - [`workspace`]: per-request source/processed directories with scoped release
//! - [`watermark`]: the single active watermark of each chat
//! - [`fs`]: iterative tree removal shared by both
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<chat>/watermark/<file>
//! <root>/<chat>/source/<request>/<file>
//! <root>/<chat>/processed/<request>/<file>
//! ```

pub mod error;
pub mod fs;
pub mod layout;
pub mod watermark;
pub mod workspace;

pub use error::{Result, StorageError};
pub use layout::StorageLayout;
pub use watermark::{WatermarkRecord, WatermarkSnapshot, WatermarkStore};
pub use workspace::{Workspace, WorkspaceManager};
