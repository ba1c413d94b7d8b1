//! Core tiling and metadata assembly modules

pub mod footprint;
pub mod metadata;
pub mod performance;
pub mod select;

// Re-export main types
pub use footprint::{FootprintResolver, Scene};
pub use metadata::{
    dem_reference, generate_product_id, DemReference, MetadataAssembler, ProcessingParameters,
    ProductMetadataRecord, ProductNameParts, SourceProvenance,
};
pub use performance::{
    GeolocationAccuracy, ImpulseResponseMetrics, NoiseEquivalent, PerformanceEstimator,
    PerformanceMetrics, PerformanceParams, PointTargetMetrics,
};
pub use select::{AoiSpec, ProcessingTile, SelectorParams, TileSelector};
