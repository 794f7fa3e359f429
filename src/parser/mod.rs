//! Lock file parsing.
//!
//! Turns a package manager lock file into a [`DependencyTree`](crate::types::DependencyTree).
//! Only pnpm's `pnpm-lock.yaml` dialect is supported.

pub mod pnpm;

pub use pnpm::{parse_package_key, PnpmLockParser};
