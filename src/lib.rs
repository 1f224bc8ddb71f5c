//! # Netweave - Cross-account network association planner
//!
//! This library plans the network wiring of one deployment unit, an
//! (account, region) pair, from a declarative multi-account topology.
//!
//! ## Overview
//!
//! Every deployment unit is executed in isolation, yet transit gateways,
//! attachments, route tables and peering connections reference each other
//! across account and region boundaries. Netweave decides for each
//! referenced resource how its identifier can be obtained from the current
//! unit, resolves it once, and emits the ordered set of association, route
//! and peering records the unit must create.
//!
//! ## Key Features
//!
//! - **Resolution strategies**: local read, resource share, same-account
//!   remote read or assumed cross-account identity
//! - **Memoization**: one remote call per resource and owner per run
//! - **Deterministic keys**: every map, record and published value is keyed
//!   by pure functions of names
//! - **Templated VPCs**: VPCs deployed to whole organizational units
//! - **Peering**: requester and accepter routes, with cross-account route
//!   operations when the accepter lives elsewhere
//!
//! ## Architecture
//!
//! - `config`: Topology structures and YAML parsing
//! - `config_loader`: Topology file loading and CLI overrides
//! - `accounts`: Account registry and deployment-target expansion
//! - `keys`: Key, path and role name derivation
//! - `backend`: Traits for the published-value store and provider lookups
//! - `resolver`: Cross-boundary resolution with per-run caches
//! - `topology`: Maps, associations, gateway routes, DNS and peering
//! - `plan`: The serializable plan of one unit
//! - `orchestrator`: Runs the stages in order and publishes created ids
//! - `error`: Structured planner errors
//! - `utils`: Validation and CIDR helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netweave::backend::MemoryBackend;
//! use netweave::topology::Scope;
//! use netweave::{config_loader, orchestrator};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("topology.yaml"))?;
//! let backend = MemoryBackend::from_json_file(Path::new("values.json"))?;
//!
//! let plan = orchestrator::plan_unit(&config, &Scope::new("Network", "us-east-1"), &backend)?;
//! println!("{}", plan.to_yaml()?);
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Planner stages return `netweave::error::Result` whose errors carry a
//! kind, the key that failed and the scope it was searched in. Loading and
//! the binary use `color_eyre` for reporting with context.

pub mod accounts;
pub mod backend;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod keys;
pub mod orchestrator;
pub mod plan;
pub mod resolver;
pub mod topology;
pub mod utils;
