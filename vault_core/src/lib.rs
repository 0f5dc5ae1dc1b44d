pub mod container;
pub mod crypto;
pub mod error;
pub mod header;
pub mod mount;
pub mod namespace;

pub use error::{Result, VaultError};
pub use header::{header_area_size, HeaderPayload, NUM_HEADER_SLOTS, VOLUME_SIZE};
pub use mount::{EntryView, MountManager};
pub use namespace::{EntryKind, FileEntry, Namespace};
