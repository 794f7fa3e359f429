//! Registry availability checks.
//!
//! One tarball GET per package version; the HTTP status decides whether
//! the version is available, blocked or missing.

pub mod probe;

pub use probe::{classify_status, tarball_url, Prober, RegistryProber};
