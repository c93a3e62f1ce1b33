//! Python code generation from the normalized IR.
//!
//! ## Module Structure
//!
//! - `types`: TypeGraph nodes to Python annotations, literals and defaults
//! - `models`: one pydantic unit per type declaration
//! - `services`: request function units per service group and calling convention
//! - `config`: the `api_config` unit

pub mod config;
pub mod models;
pub mod services;
mod types;

pub use config::{CONFIG_UNIT, emit_config};
pub use models::emit_model;
pub use services::{emit_service, unit_name};
pub(crate) use services::{ServiceGroup, group_operations};
