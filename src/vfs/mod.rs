//! Layered asset filesystem
//!
//! Presents one logical filesystem backed by an ordered list of sources:
//! the primary local directory, zero or more overlays, and a fallback.
//! Earlier sources win on name collisions; directories merge across all of them.

pub mod disk;
pub mod layered;
pub mod memory;
pub mod path;
pub mod source;

pub use disk::DiskSource;
pub use layered::{LayeredFileSystem, MergedDir};
pub use memory::MemorySource;
pub use source::{EntryInfo, Node, Source};
