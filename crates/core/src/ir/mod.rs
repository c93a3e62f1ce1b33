//! Intermediate representation between the API document and generated code.
//!
//! ## Module Structure
//!
//! - `types`: the TypeGraph arena (TypeNode, TypeDecl, Literal)
//! - `resolve`: schema classification and reference resolution
//! - `api`: API-level IR (OperationIR, ParamIR, BodyIR, ResponseIR)
//! - `normalize`: API document -> API IR conversion
//! - `utils`: naming helpers shared with code generation

pub mod api;
mod normalize;
mod resolve;
pub mod types;
pub mod utils;

pub use normalize::normalize_spec;
