use crate::core::metadata::{ProcessingParameters, ProductMetadataRecord, SourceProvenance};
use crate::core::performance::PerformanceMetrics;
use crate::types::{ArdError, ArdResult, BoundingBox};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

const STAC_VERSION: &str = "1.0.0";
const CARD4L_SPEC: &str = "NRB";
const CARD4L_VERSION: &str = "5.5";
const CARD4L_LINK: &str = "https://ceos.org/ard/files/PFS/NRB/v5.5/CARD4L-PFS_NRB_v5.5.pdf";

/// STAC item representation of a [`ProductMetadataRecord`].
///
/// The mapping is one-to-one and lossless: parsing a written item back
/// reproduces every record field exactly.
#[derive(Debug, Serialize, Deserialize)]
pub struct StacItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub stac_version: String,
    pub stac_extensions: Vec<String>,
    pub id: String,
    pub geometry: geojson::Geometry,
    pub bbox: [f64; 4],
    pub properties: StacProperties,
    #[serde(default)]
    pub links: Vec<StacLink>,
    #[serde(default)]
    pub assets: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StacProperties {
    pub datetime: DateTime<Utc>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: DateTime<Utc>,
    pub created: DateTime<Utc>,
    #[serde(rename = "proj:epsg")]
    pub epsg: u32,
    #[serde(rename = "proj:bbox")]
    pub proj_bbox: [f64; 4],
    #[serde(rename = "grid:code")]
    pub grid_code: String,
    #[serde(rename = "card4l:specification")]
    pub specification: String,
    #[serde(rename = "card4l:specification_version")]
    pub specification_version: String,
    #[serde(rename = "card4l:source_scenes")]
    pub sources: Vec<SourceProvenance>,
    #[serde(rename = "card4l:performance_indicators")]
    pub metrics: PerformanceMetrics,
    #[serde(rename = "card4l:processing_parameters")]
    pub parameters: ProcessingParameters,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StacLink {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// STAC serializer for product metadata records.
pub struct StacWriter;

impl StacWriter {
    /// Map a record onto its STAC item.
    pub fn to_item(record: &ProductMetadataRecord) -> StacItem {
        let footprint = record.footprint_wgs84;
        let geometry = geojson::Geometry::new(geojson::Value::from(&footprint.to_polygon()));
        let duration = record.stop_time - record.start_time;

        StacItem {
            item_type: "Feature".to_string(),
            stac_version: STAC_VERSION.to_string(),
            stac_extensions: vec![
                "https://stac-extensions.github.io/projection/v1.1.0/schema.json".to_string(),
                "https://stac-extensions.github.io/card4l/v1.0.0/sar/product.json".to_string(),
            ],
            id: record.product_id.clone(),
            geometry,
            bbox: [
                footprint.xmin,
                footprint.ymin,
                footprint.xmax,
                footprint.ymax,
            ],
            properties: StacProperties {
                datetime: record.start_time + duration / 2,
                start_datetime: record.start_time,
                end_datetime: record.stop_time,
                created: record.created,
                epsg: record.epsg,
                proj_bbox: [
                    record.extent.xmin,
                    record.extent.ymin,
                    record.extent.xmax,
                    record.extent.ymax,
                ],
                grid_code: format!("MGRS-{}", record.tile_id),
                specification: CARD4L_SPEC.to_string(),
                specification_version: CARD4L_VERSION.to_string(),
                sources: record.sources.clone(),
                metrics: record.metrics.clone(),
                parameters: record.parameters.clone(),
            },
            links: vec![StacLink {
                rel: "card4l-document".to_string(),
                href: CARD4L_LINK.to_string(),
                title: Some(format!(
                    "CARD4L Product Family Specification v{}: Normalised Radar Backscatter",
                    CARD4L_VERSION
                )),
            }],
            assets: serde_json::Map::new(),
        }
    }

    /// Reconstruct the record from a parsed STAC item.
    pub fn from_item(item: &StacItem) -> ArdResult<ProductMetadataRecord> {
        let tile_id = item
            .properties
            .grid_code
            .strip_prefix("MGRS-")
            .ok_or_else(|| {
                ArdError::InvalidFormat(format!(
                    "unexpected grid code '{}'",
                    item.properties.grid_code
                ))
            })?
            .to_string();

        let p = &item.properties;
        Ok(ProductMetadataRecord {
            product_id: item.id.clone(),
            tile_id,
            epsg: p.epsg,
            extent: BoundingBox::new(
                p.proj_bbox[0],
                p.proj_bbox[1],
                p.proj_bbox[2],
                p.proj_bbox[3],
            ),
            footprint_wgs84: BoundingBox::new(
                item.bbox[0],
                item.bbox[1],
                item.bbox[2],
                item.bbox[3],
            ),
            created: p.created,
            start_time: p.start_datetime,
            stop_time: p.end_datetime,
            sources: p.sources.clone(),
            metrics: p.metrics.clone(),
            parameters: p.parameters.clone(),
        })
    }

    /// Write the record as a STAC JSON document.
    pub fn write_stac<P: AsRef<Path>>(record: &ProductMetadataRecord, path: P) -> ArdResult<()> {
        log::info!(
            "Writing STAC metadata for product {}: {}",
            record.product_id,
            path.as_ref().display()
        );
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &Self::to_item(record))?;
        Ok(())
    }

    /// Parse a written STAC document back into a record.
    pub fn read_stac<P: AsRef<Path>>(path: P) -> ArdResult<ProductMetadataRecord> {
        let file = File::open(path)?;
        let item: StacItem = serde_json::from_reader(BufReader::new(file))?;
        Self::from_item(&item)
    }
}
