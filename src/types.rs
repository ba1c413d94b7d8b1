use chrono::{DateTime, Utc};
use geo::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Polarization channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl std::str::FromStr for Polarization {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            other => Err(ArdError::InvalidFormat(format!(
                "Invalid polarization: {}",
                other
            ))),
        }
    }
}

/// Acquisition mode of a source scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionMode {
    IW, // Interferometric Wide swath
    EW, // Extra Wide swath
    SM, // StripMap
    WV, // Wave
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionMode::IW => write!(f, "IW"),
            AcquisitionMode::EW => write!(f, "EW"),
            AcquisitionMode::SM => write!(f, "SM"),
            AcquisitionMode::WV => write!(f, "WV"),
        }
    }
}

impl std::str::FromStr for AcquisitionMode {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IW" => Ok(AcquisitionMode::IW),
            "EW" => Ok(AcquisitionMode::EW),
            "SM" => Ok(AcquisitionMode::SM),
            "WV" => Ok(AcquisitionMode::WV),
            other => Err(ArdError::InvalidFormat(format!(
                "Invalid acquisition mode: {}",
                other
            ))),
        }
    }
}

/// Orbit direction at acquisition time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

impl std::fmt::Display for OrbitDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrbitDirection::Ascending => write!(f, "ascending"),
            OrbitDirection::Descending => write!(f, "descending"),
        }
    }
}

impl std::str::FromStr for OrbitDirection {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A" | "ASC" | "ASCENDING" => Ok(OrbitDirection::Ascending),
            "D" | "DESC" | "DESCENDING" => Ok(OrbitDirection::Descending),
            other => Err(ArdError::InvalidFormat(format!(
                "Invalid orbit direction: {}",
                other
            ))),
        }
    }
}

/// Orbit state vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVector {
    pub time: DateTime<Utc>,
    pub position: [f64; 3], // [x, y, z] in meters (ECEF)
    pub velocity: [f64; 3], // [vx, vy, vz] in m/s
}

/// Orbit information for a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitData {
    pub state_vectors: Vec<StateVector>,
    pub reference_time: DateTime<Utc>,
}

/// Axis-aligned extent in an arbitrary planar CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Expand the extent by `margin` units on every side
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            xmin: self.xmin - margin,
            ymin: self.ymin - margin,
            xmax: self.xmax + margin,
            ymax: self.ymax + margin,
        }
    }

    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.xmin <= other.xmin
            && self.ymin <= other.ymin
            && self.xmax >= other.xmax
            && self.ymax >= other.ymax
    }

    /// Closed ring polygon tracing the extent counter-clockwise
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                Coord {
                    x: self.xmin,
                    y: self.ymin,
                },
                Coord {
                    x: self.xmax,
                    y: self.ymin,
                },
                Coord {
                    x: self.xmax,
                    y: self.ymax,
                },
                Coord {
                    x: self.xmin,
                    y: self.ymax,
                },
                Coord {
                    x: self.xmin,
                    y: self.ymin,
                },
            ]),
            vec![],
        )
    }

    /// Axis-aligned envelope of a polygon's exterior ring
    pub fn from_polygon(polygon: &Polygon<f64>) -> Option<Self> {
        let mut coords = polygon.exterior().coords();
        let first = coords.next()?;
        let mut bbox = BoundingBox::new(first.x, first.y, first.x, first.y);
        for c in coords {
            bbox.xmin = bbox.xmin.min(c.x);
            bbox.ymin = bbox.ymin.min(c.y);
            bbox.xmax = bbox.xmax.max(c.x);
            bbox.ymax = bbox.ymax.max(c.y);
        }
        Some(bbox)
    }
}

/// Error types for ARD assembly
#[derive(Debug, thiserror::Error)]
pub enum ArdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed tiling scheme entry for tile '{tile}': {detail}")]
    SchemeParse { tile: String, detail: String },

    #[error("Tile ID '{0}' not found in the tiling scheme")]
    UnknownTile(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Incomplete metadata for product '{product}': missing {field} for scene '{scene}'")]
    IncompleteMetadata {
        product: String,
        scene: String,
        field: String,
    },

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for ARD operations
pub type ArdResult<T> = Result<T, ArdError>;
