// Core modules implementing format inference, codecs, persistence, and directory sync.
pub mod checkpoint;
pub mod codec;
pub mod coerce;
pub mod dirs;
pub mod error;
pub mod format;
pub mod image;
pub mod persist;
pub mod sync;
