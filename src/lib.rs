//! sar-ard: ARD tiling and metadata assembly for radar backscatter products
//!
//! This library turns a user-supplied area of interest into a deterministic
//! set of fixed-grid tiles aligned to a reference tiling scheme, derives
//! quality indicators from source-scene annotation data, and packages the
//! result into standardized STAC and XML metadata records.
//!
//! The SAR geocoding engine, raster warping and COG writing are external
//! collaborators: this crate produces the tile work-list they consume and
//! the metadata records describing their outputs.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionMode, ArdError, ArdResult, BoundingBox, OrbitData, OrbitDirection, Polarization,
    StateVector,
};

pub use core::{
    AoiSpec, FootprintResolver, MetadataAssembler, PerformanceEstimator, PerformanceMetrics,
    ProcessingParameters, ProcessingTile, ProductMetadataRecord, Scene, SelectorParams,
    TileSelector,
};

pub use io::{AnnotationParser, GridCatalog, GridTile, SourceAnnotation, StacWriter, XmlWriter};
