use crate::core::performance::PerformanceMetrics;
use crate::core::select::ProcessingTile;
use crate::io::annotation::SourceAnnotation;
use crate::types::{
    AcquisitionMode, ArdError, ArdResult, BoundingBox, OrbitDirection, Polarization,
};
use chrono::{DateTime, Utc};
use crc::{Crc, CRC_16_IBM_3740};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// CRC-16/CCITT with initial value 0xFFFF, as used for product identifiers.
const PRODUCT_ID_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Processing parameters recorded with every product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    pub range_looks: u32,
    pub azimuth_looks: u32,
    /// Output pixel spacing, meters (column = x, row = y)
    pub column_spacing: f64,
    pub row_spacing: f64,
    pub dem_name: String,
    pub compression: String,
    pub processor_name: String,
    pub processor_version: String,
}

impl Default for ProcessingParameters {
    fn default() -> Self {
        Self {
            range_looks: 1,
            azimuth_looks: 1,
            column_spacing: 10.0,
            row_spacing: 10.0,
            dem_name: "Copernicus 30m Global DEM II".to_string(),
            compression: "DEFLATE".to_string(),
            processor_name: env!("CARGO_PKG_NAME").to_string(),
            processor_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// External references for a known DEM.
#[derive(Debug, Clone, PartialEq)]
pub struct DemReference {
    pub url: &'static str,
    pub reference: &'static str,
    pub dem_type: &'static str,
    pub egm_reference: &'static str,
}

/// References for the DEMs the processing chain knows about.
pub fn dem_reference(name: &str) -> Option<DemReference> {
    match name {
        "GETASSE30" => Some(DemReference {
            url: "https://step.esa.int/auxdata/dem/GETASSE30",
            reference: "https://seadas.gsfc.nasa.gov/help-8.1.0/desktop/GETASSE30ElevationModel.html",
            dem_type: "elevation",
            egm_reference: "https://apps.dtic.mil/sti/citations/ADA166519",
        }),
        "Copernicus 10m EEA DEM" => Some(DemReference {
            url: "ftps://cdsdata.copernicus.eu/DEM-datasets/COP-DEM_EEA-10-DGED/2021_1",
            reference: "https://spacedata.copernicus.eu/web/cscda/dataset-details?articleId=394198",
            dem_type: "surface",
            egm_reference: "https://doi.org/10.1029/2011JB008916",
        }),
        "Copernicus 30m Global DEM II" => Some(DemReference {
            url: "ftps://cdsdata.copernicus.eu/DEM-datasets/COP-DEM_GLO-30-DGED/2021_1",
            reference: "https://spacedata.copernicus.eu/web/cscda/dataset-details?articleId=394198",
            dem_type: "surface",
            egm_reference: "https://doi.org/10.1029/2011JB008916",
        }),
        "Copernicus 90m Global DEM II" => Some(DemReference {
            url: "ftps://cdsdata.copernicus.eu/DEM-datasets/COP-DEM_GLO-90-DGED/2021_1",
            reference: "https://spacedata.copernicus.eu/web/cscda/dataset-details?articleId=394198",
            dem_type: "surface",
            egm_reference: "https://doi.org/10.1029/2011JB008916",
        }),
        _ => None,
    }
}

/// Validated provenance of one source scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProvenance {
    pub scene_id: String,
    pub acquisition_mode: AcquisitionMode,
    pub polarization: Polarization,
    pub orbit_direction: OrbitDirection,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
}

/// Complete metadata record for one output tile-product.
///
/// References exactly one processing tile and zero-or-more source scenes.
/// Created after raster processing, serialized once, then immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadataRecord {
    /// Generated unique product identifier (CRC-16 hex)
    pub product_id: String,
    pub tile_id: String,
    pub epsg: u32,
    /// Product extent in the tile's native CRS
    pub extent: BoundingBox,
    /// Product envelope in geographic coordinates
    pub footprint_wgs84: BoundingBox,
    pub created: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    /// `default` keeps the XML round trip intact: an empty list emits no
    /// elements at all, so parsing must tolerate the field's absence
    #[serde(default)]
    pub sources: Vec<SourceProvenance>,
    pub metrics: PerformanceMetrics,
    pub parameters: ProcessingParameters,
}

/// Merges geometry, metrics and provenance into the per-product record.
pub struct MetadataAssembler;

impl MetadataAssembler {
    /// Assemble the metadata record for one tile-product.
    ///
    /// This is the hard failure boundary for provenance: a scene with a
    /// missing acquisition mode, polarization or orbit direction raises
    /// `IncompleteMetadataError` for this product only; other tiles are
    /// unaffected.
    pub fn assemble(
        tile: &ProcessingTile,
        metrics: PerformanceMetrics,
        scenes: &[SourceAnnotation],
        parameters: ProcessingParameters,
        proc_time: DateTime<Utc>,
    ) -> ArdResult<ProductMetadataRecord> {
        let sources = scenes
            .iter()
            .map(|s| Self::validate_provenance(&tile.tile.id, s))
            .collect::<ArdResult<Vec<_>>>()?;

        let start_time = sources
            .iter()
            .map(|s| s.start_time)
            .min()
            .unwrap_or(proc_time);
        let stop_time = sources
            .iter()
            .map(|s| s.stop_time)
            .max()
            .unwrap_or(proc_time);

        let footprint_wgs84 =
            BoundingBox::from_polygon(&tile.tile.footprint).ok_or_else(|| {
                ArdError::InvalidFormat(format!("tile '{}' has an empty footprint", tile.tile.id))
            })?;

        let scene_ids: Vec<&str> = sources.iter().map(|s| s.scene_id.as_str()).collect();
        let product_id = generate_product_id(&scene_ids, &tile.tile.id, proc_time);

        log::info!(
            "Assembled product {} for tile {} from {} scene(s)",
            product_id,
            tile.tile.id,
            sources.len()
        );

        Ok(ProductMetadataRecord {
            product_id,
            tile_id: tile.tile.id.clone(),
            epsg: tile.epsg,
            extent: tile.tile.extent,
            footprint_wgs84,
            created: proc_time,
            start_time,
            stop_time,
            sources,
            metrics,
            parameters,
        })
    }

    fn validate_provenance(
        product: &str,
        scene: &SourceAnnotation,
    ) -> ArdResult<SourceProvenance> {
        let missing = |field: &str| ArdError::IncompleteMetadata {
            product: product.to_string(),
            scene: scene.scene_id.clone(),
            field: field.to_string(),
        };

        Ok(SourceProvenance {
            scene_id: scene.scene_id.clone(),
            acquisition_mode: scene
                .acquisition_mode
                .ok_or_else(|| missing("acquisition mode"))?,
            polarization: scene.polarization.ok_or_else(|| missing("polarization"))?,
            orbit_direction: scene
                .orbit_direction
                .ok_or_else(|| missing("orbit direction"))?,
            start_time: scene.start_time,
            stop_time: scene.stop_time,
        })
    }

    /// Cross-check a supplied product name against an assembled record.
    pub fn verify_product_name(name: &str, record: &ProductMetadataRecord) -> ArdResult<()> {
        let parts = ProductNameParts::parse(name)?;
        if parts.tile_id != record.tile_id {
            return Err(ArdError::InvalidFormat(format!(
                "product name tile '{}' does not match record tile '{}'",
                parts.tile_id, record.tile_id
            )));
        }
        if let Some(first) = record.sources.first() {
            if parts.mode != first.acquisition_mode.to_string() {
                return Err(ArdError::InvalidFormat(format!(
                    "product name mode '{}' does not match source mode '{}'",
                    parts.mode, first.acquisition_mode
                )));
            }
        }
        Ok(())
    }
}

/// Components of a backscatter product name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductNameParts {
    pub sensor: String,
    pub mode: String,
    pub polarization_code: String,
    pub start: String,
    pub stop: String,
    pub orbit_number: String,
    pub tile_id: String,
    pub unique_id: String,
}

impl ProductNameParts {
    /// Parse a product name of the form
    /// `<SENSOR>_<MODE>_NRB_<POLS>_<START>_<STOP>_<ORBIT>_<TILE>_<ID>`.
    pub fn parse(name: &str) -> ArdResult<Self> {
        let re = Regex::new(
            "^(?P<sensor>[A-Z0-9]{2,6})_\
             (?P<mode>[A-Z]{2})_\
             NRB_\
             (?P<pols>SH|SV|DH|DV|VV|HH|HV|VH)_\
             (?P<start>[0-9]{8}T[0-9]{6})_\
             (?P<stop>[0-9]{8}T[0-9]{6})_\
             (?P<orbit>[0-9]{6})_\
             (?P<tile>[0-9A-Z]{5})_\
             (?P<id>[0-9A-F]{4})$",
        )
        .unwrap();
        let caps = re.captures(name).ok_or_else(|| {
            ArdError::InvalidFormat(format!("product name '{}' does not match pattern", name))
        })?;

        Ok(Self {
            sensor: caps["sensor"].to_string(),
            mode: caps["mode"].to_string(),
            polarization_code: caps["pols"].to_string(),
            start: caps["start"].to_string(),
            stop: caps["stop"].to_string(),
            orbit_number: caps["orbit"].to_string(),
            tile_id: caps["tile"].to_string(),
            unique_id: caps["id"].to_string(),
        })
    }
}

/// Unique, collision-resistant product identifier.
///
/// CRC-16/CCITT (initial 0xFFFF) over the sorted source scene IDs, the
/// tile ID and the processing timestamp, rendered as four hex digits.
/// Re-running with a different timestamp yields a different ID; identical
/// logical inputs at the same instant reproduce the same ID.
pub fn generate_product_id(scene_ids: &[&str], tile_id: &str, proc_time: DateTime<Utc>) -> String {
    let mut ids: Vec<&str> = scene_ids.to_vec();
    ids.sort_unstable();
    let encoded = format!("{}|{}|{}", ids.join(","), tile_id, proc_time.to_rfc3339());
    format!("{:04X}", PRODUCT_ID_CRC.checksum(encoded.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_product_id_reproducible() {
        let t = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        let a = generate_product_id(&["S1", "S2"], "32TNS", t);
        let b = generate_product_id(&["S2", "S1"], "32TNS", t);
        assert_eq!(a, b); // scene order must not matter
        assert_eq!(a.len(), 4);

        let later = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 1).unwrap();
        assert_ne!(a, generate_product_id(&["S1", "S2"], "32TNS", later));
    }

    #[test]
    fn test_product_name_parsing() {
        let parts =
            ProductNameParts::parse("ERS2_IM_NRB_VV_20040101T120000_20040101T120030_012345_32TNS_A1B2")
                .unwrap();
        assert_eq!(parts.sensor, "ERS2");
        assert_eq!(parts.mode, "IM");
        assert_eq!(parts.tile_id, "32TNS");
        assert_eq!(parts.unique_id, "A1B2");

        assert!(ProductNameParts::parse("not_a_product_name").is_err());
    }

    #[test]
    fn test_dem_reference_lookup() {
        assert!(dem_reference("GETASSE30").is_some());
        assert!(dem_reference("unknown DEM").is_none());
    }
}
