//! Account management module.
//!
//! Maps configured account names to ids and expands templated deployment
//! targets (explicit accounts and organizational units, minus exclusions).

pub mod registry;

pub use registry::{AccountInfo, AccountRegistry};
