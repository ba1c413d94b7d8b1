//! Readers and writers for grid, annotation and output metadata formats

pub mod annotation;
pub mod grid;
pub mod stac;
pub mod xml_report;

// Re-export main types
pub use annotation::{
    AnnotationParser, CalibrationConstants, GeoRefPoint, PointTarget, SourceAnnotation,
};
pub use grid::{GridCatalog, GridTile, TileAttributes};
pub use stac::{StacItem, StacWriter};
pub use xml_report::XmlWriter;
