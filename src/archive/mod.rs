//! Archive type registry and archive instance cache (`spec.md` §4.4/§4.5).

pub mod cache;
pub mod registry;

pub use cache::{ArchiveCache, GcPolicy};
pub use registry::ArchiveTypeRegistry;
