use crate::types::{
    AcquisitionMode, ArdError, ArdResult, OrbitData, OrbitDirection, Polarization, StateVector,
};
use chrono::{DateTime, Utc};
use geo::Polygon;
use num_complex::Complex;
use quick_xml::de::from_str;
use serde::Deserialize;
use std::path::Path;
use wkt::TryFromWkt;

/// XML structures for the per-scene source annotation record.
/// This represents the root `<sourceAnnotation>` element directly.
#[derive(Debug, Deserialize)]
struct AnnotationRoot {
    #[serde(rename = "sceneId")]
    scene_id: String,
    #[serde(rename = "acquisitionMode")]
    acquisition_mode: Option<String>,
    #[serde(rename = "polarization")]
    polarization: Option<String>,
    #[serde(rename = "orbitDirection")]
    orbit_direction: Option<String>,
    #[serde(rename = "startTime")]
    start_time: DateTime<Utc>,
    #[serde(rename = "stopTime")]
    stop_time: DateTime<Utc>,
    #[serde(rename = "footprint")]
    footprint: Option<String>,
    #[serde(rename = "incidenceAngleNear")]
    incidence_angle_near: Option<f64>,
    #[serde(rename = "incidenceAngleFar")]
    incidence_angle_far: Option<f64>,
    #[serde(rename = "orbit")]
    orbit: Option<OrbitBlock>,
    #[serde(rename = "radiometricCalibration")]
    radiometric_calibration: Option<CalibrationBlock>,
    #[serde(rename = "pointTargetList")]
    point_target_list: Option<PointTargetList>,
    #[serde(rename = "geolocationGrid")]
    geolocation_grid: Option<GeolocationGrid>,
}

#[derive(Debug, Deserialize)]
struct OrbitBlock {
    #[serde(rename = "stateVector")]
    state_vectors: Vec<StateVectorXml>,
}

#[derive(Debug, Deserialize)]
struct StateVectorXml {
    #[serde(rename = "time")]
    time: DateTime<Utc>,
    #[serde(rename = "x")]
    x: f64,
    #[serde(rename = "y")]
    y: f64,
    #[serde(rename = "z")]
    z: f64,
    #[serde(rename = "vx")]
    vx: f64,
    #[serde(rename = "vy")]
    vy: f64,
    #[serde(rename = "vz")]
    vz: f64,
}

#[derive(Debug, Deserialize)]
struct CalibrationBlock {
    #[serde(rename = "absoluteCalibrationConstant")]
    absolute_calibration_constant: f64,
    #[serde(rename = "noisePowerConstant")]
    noise_power_constant: f64,
    #[serde(rename = "referenceIncidenceAngle")]
    reference_incidence_angle: f64,
}

#[derive(Debug, Deserialize)]
struct PointTargetList {
    #[serde(rename = "pointTarget", default)]
    point_targets: Vec<PointTargetXml>,
}

#[derive(Debug, Deserialize)]
struct PointTargetXml {
    #[serde(rename = "rangeSpacing")]
    range_spacing: f64,
    #[serde(rename = "azimuthSpacing")]
    azimuth_spacing: f64,
    #[serde(rename = "rangeResponse")]
    range_response: String,
    #[serde(rename = "azimuthResponse")]
    azimuth_response: String,
}

#[derive(Debug, Deserialize)]
struct GeolocationGrid {
    #[serde(rename = "gridPoint", default)]
    grid_points: Vec<GridPointXml>,
}

#[derive(Debug, Deserialize)]
struct GridPointXml {
    #[serde(rename = "latitude")]
    latitude: f64,
    #[serde(rename = "longitude")]
    longitude: f64,
    #[serde(rename = "slantRangeTime")]
    slant_range_time: f64,
    #[serde(rename = "azimuthTime")]
    azimuth_time: DateTime<Utc>,
}

/// Radiometric calibration constants supplied by the L1 processor.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConstants {
    /// Absolute calibration constant K (linear)
    pub absolute_constant: f64,
    /// Noise power constant (linear, same scale as K)
    pub noise_power: f64,
    /// Incidence angle the constants are referenced to, degrees
    pub reference_incidence_deg: f64,
}

/// Embedded point-target calibration return with complex impulse-response
/// samples along both image axes.
#[derive(Debug, Clone)]
pub struct PointTarget {
    pub range_spacing: f64,   // meters per sample
    pub azimuth_spacing: f64, // meters per sample
    pub range_response: Vec<Complex<f64>>,
    pub azimuth_response: Vec<Complex<f64>>,
}

/// Header-declared geolocation reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRefPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Two-way slant range time, seconds
    pub slant_range_time: f64,
    pub azimuth_time: DateTime<Utc>,
}

/// Parsed per-scene annotation record. Read-only after parsing.
///
/// Provenance fields are optional here; [`crate::core::MetadataAssembler`]
/// enforces their presence at assembly time.
#[derive(Debug, Clone)]
pub struct SourceAnnotation {
    pub scene_id: String,
    pub acquisition_mode: Option<AcquisitionMode>,
    pub polarization: Option<Polarization>,
    pub orbit_direction: Option<OrbitDirection>,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    /// Scene footprint in geographic coordinates, if declared
    pub footprint: Option<Polygon<f64>>,
    pub incidence_near_deg: Option<f64>,
    pub incidence_far_deg: Option<f64>,
    pub orbit: Option<OrbitData>,
    pub calibration: Option<CalibrationConstants>,
    pub point_targets: Vec<PointTarget>,
    pub reference_points: Vec<GeoRefPoint>,
}

/// Parser for source-scene annotation XML files
pub struct AnnotationParser;

impl AnnotationParser {
    /// Parse a complete annotation XML document.
    pub fn parse_annotation(xml_content: &str) -> ArdResult<SourceAnnotation> {
        let root = from_str::<AnnotationRoot>(xml_content)
            .map_err(|e| ArdError::XmlParsing(format!("Failed to parse annotation XML: {}", e)))?;
        Self::convert(root)
    }

    /// Read and parse an annotation file.
    pub fn read_file<P: AsRef<Path>>(path: P) -> ArdResult<SourceAnnotation> {
        log::debug!("Reading scene annotation: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        Self::parse_annotation(&content)
    }

    fn convert(root: AnnotationRoot) -> ArdResult<SourceAnnotation> {
        let scene_id = root.scene_id;

        // Unrecognized enum codes degrade to absent provenance; the
        // assembly stage decides whether that is fatal for the product.
        let acquisition_mode = parse_enum_field::<AcquisitionMode>(
            &scene_id,
            "acquisitionMode",
            root.acquisition_mode.as_deref(),
        );
        let polarization = parse_enum_field::<Polarization>(
            &scene_id,
            "polarization",
            root.polarization.as_deref(),
        );
        let orbit_direction = parse_enum_field::<OrbitDirection>(
            &scene_id,
            "orbitDirection",
            root.orbit_direction.as_deref(),
        );

        let footprint = match root.footprint.as_deref() {
            Some(wkt_str) => Some(Polygon::<f64>::try_from_wkt_str(wkt_str).map_err(|e| {
                ArdError::XmlParsing(format!(
                    "scene '{}': invalid footprint WKT: {}",
                    scene_id, e
                ))
            })?),
            None => None,
        };

        let orbit = root.orbit.filter(|o| !o.state_vectors.is_empty()).map(|o| {
            let reference_time = o.state_vectors[0].time;
            OrbitData {
                state_vectors: o
                    .state_vectors
                    .into_iter()
                    .map(|sv| StateVector {
                        time: sv.time,
                        position: [sv.x, sv.y, sv.z],
                        velocity: [sv.vx, sv.vy, sv.vz],
                    })
                    .collect(),
                reference_time,
            }
        });

        let calibration = root.radiometric_calibration.map(|c| CalibrationConstants {
            absolute_constant: c.absolute_calibration_constant,
            noise_power: c.noise_power_constant,
            reference_incidence_deg: c.reference_incidence_angle,
        });

        let mut point_targets = Vec::new();
        if let Some(list) = root.point_target_list {
            for pt in list.point_targets {
                point_targets.push(PointTarget {
                    range_spacing: pt.range_spacing,
                    azimuth_spacing: pt.azimuth_spacing,
                    range_response: parse_complex_samples(&scene_id, &pt.range_response)?,
                    azimuth_response: parse_complex_samples(&scene_id, &pt.azimuth_response)?,
                });
            }
        }

        let reference_points = root
            .geolocation_grid
            .map(|g| {
                g.grid_points
                    .into_iter()
                    .map(|p| GeoRefPoint {
                        latitude: p.latitude,
                        longitude: p.longitude,
                        slant_range_time: p.slant_range_time,
                        azimuth_time: p.azimuth_time,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SourceAnnotation {
            scene_id,
            acquisition_mode,
            polarization,
            orbit_direction,
            start_time: root.start_time,
            stop_time: root.stop_time,
            footprint,
            incidence_near_deg: root.incidence_angle_near,
            incidence_far_deg: root.incidence_angle_far,
            orbit,
            calibration,
            point_targets,
            reference_points,
        })
    }
}

fn parse_enum_field<T: std::str::FromStr>(
    scene_id: &str,
    field: &str,
    value: Option<&str>,
) -> Option<T> {
    match value {
        Some(s) => match s.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                log::warn!(
                    "scene '{}': unrecognized {} '{}', treating as absent",
                    scene_id,
                    field,
                    s
                );
                None
            }
        },
        None => None,
    }
}

/// Decode whitespace-separated `i,q` complex sample pairs.
fn parse_complex_samples(scene_id: &str, text: &str) -> ArdResult<Vec<Complex<f64>>> {
    let mut samples = Vec::new();
    for token in text.split_whitespace() {
        let (i, q) = token.split_once(',').ok_or_else(|| {
            ArdError::InvalidFormat(format!(
                "scene '{}': point-target sample '{}' is not an i,q pair",
                scene_id, token
            ))
        })?;
        let re: f64 = i.parse().map_err(|_| {
            ArdError::InvalidFormat(format!(
                "scene '{}': invalid in-phase sample '{}'",
                scene_id, i
            ))
        })?;
        let im: f64 = q.parse().map_err(|_| {
            ArdError::InvalidFormat(format!(
                "scene '{}': invalid quadrature sample '{}'",
                scene_id, q
            ))
        })?;
        samples.push(Complex::new(re, im));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_annotation_parsing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <sourceAnnotation>
            <sceneId>S1A_IW_GRDH_TEST</sceneId>
            <acquisitionMode>IW</acquisitionMode>
            <polarization>VV</polarization>
            <orbitDirection>ASCENDING</orbitDirection>
            <startTime>2020-01-01T12:00:00Z</startTime>
            <stopTime>2020-01-01T12:00:25Z</stopTime>
        </sourceAnnotation>"#;

        let ann = AnnotationParser::parse_annotation(xml).unwrap();
        assert_eq!(ann.scene_id, "S1A_IW_GRDH_TEST");
        assert_eq!(ann.acquisition_mode, Some(AcquisitionMode::IW));
        assert_eq!(ann.polarization, Some(Polarization::VV));
        assert_eq!(ann.orbit_direction, Some(OrbitDirection::Ascending));
        assert!(ann.calibration.is_none());
        assert!(ann.point_targets.is_empty());
        assert!(ann.reference_points.is_empty());
    }

    #[test]
    fn test_unknown_mode_degrades_to_absent() {
        let xml = r#"<sourceAnnotation>
            <sceneId>X</sceneId>
            <acquisitionMode>ZZ</acquisitionMode>
            <startTime>2020-01-01T12:00:00Z</startTime>
            <stopTime>2020-01-01T12:00:25Z</stopTime>
        </sourceAnnotation>"#;

        let ann = AnnotationParser::parse_annotation(xml).unwrap();
        assert!(ann.acquisition_mode.is_none());
    }

    #[test]
    fn test_complex_sample_decoding() {
        let samples = parse_complex_samples("X", "1.0,0.0 0.5,-0.5").unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1], Complex::new(0.5, -0.5));

        assert!(parse_complex_samples("X", "1.0;0.0").is_err());
    }
}
