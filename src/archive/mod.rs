//! Post-verification archival and cleanup (spec §4.9 "Archiver" /
//! "Cleaner").

pub mod archiver;
pub mod cleaner;

pub use archiver::Archiver;
pub use cleaner::{CleanupOutcome, Cleaner};
