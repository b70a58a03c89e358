//! USD (Universal Scene Description) text layer support.
//!
//! This module provides the prim and value types of a layer, a USDA
//! (ASCII) reader and writer, and file loading.
//!
//! ## Supported
//!
//! - Typed and typeless prims with metadata, attributes, connections and
//!   relationships
//! - Layer metadata (`defaultPrim`, `metersPerUnit`, `upAxis`,
//!   `customLayerData`)
//!
//! ## Kept verbatim, not interpreted
//!
//! - Variant sets, time samples, list-edited properties
//! - Composition arcs in prim metadata (references, payloads)
//!
//! ## Not supported
//!
//! - Binary `.usdc` layers
//!
//! # Example
//!
//! ```ignore
//! use usdz_core::usd::load_usda;
//!
//! let stage = load_usda("path/to/scene.usda")?;
//! println!("Default prim: {:?}", stage.default_prim_path());
//! ```

mod types;
mod parser;
mod loader;
pub(crate) mod writer;

pub use types::*;
pub use parser::*;
pub use loader::*;
pub use writer::write_usda;
