//! usdz_core - Scene graph and USDA support for usdzconvert.
//!
//! This crate provides:
//!
//! - **Stage**: a single-layer USD scene graph of typed prims with
//!   attributes, connections and relationships
//! - **USD support**: USDA reading and writing
//! - **Paths**: prim path and identifier helpers
//! - **Mesh**: triangle geometry that importers turn into `Mesh` prims
//!
//! # Example
//!
//! ```ignore
//! use usdz_core::usd::load_usda;
//!
//! let mut stage = load_usda("scene.usda")?;
//! for path in stage.material_paths() {
//!     println!("material {}", path);
//! }
//! stage.export("out.usda")?;
//! ```

pub mod mesh;
pub mod path;
pub mod stage;
pub mod usd;

// Re-export commonly used types
pub use mesh::Mesh;
pub use stage::{LayerMetadata, Stage, StageError, StageResult, Visit};
pub use usd::{
    load_usda, load_usda_from_string, prim_types, Attribute, Prim, Relationship, Specifier, Value, XformOp,
    MATERIAL_BINDING,
};
