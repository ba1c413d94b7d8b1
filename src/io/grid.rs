use crate::types::{ArdError, ArdResult, BoundingBox};
use geo::{Intersects, MultiPolygon, Polygon};
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use wkt::TryFromWkt;

/// One tile of the reference tiling scheme (MGRS-style fixed grid).
///
/// Immutable after catalog load; all geometry is read once from the
/// reference file.
#[derive(Debug, Clone)]
pub struct GridTile {
    /// Scheme-specific tile identifier, e.g. "32TNS"
    pub id: String,
    /// EPSG code of the tile's native projected CRS
    pub epsg: u32,
    /// Grid reference string as carried by the scheme, if present
    pub grid_ref: Option<String>,
    /// Tile outline in geographic coordinates (EPSG:4326)
    pub footprint: Polygon<f64>,
    /// Tile outline in its native projected CRS
    pub outline: Polygon<f64>,
    /// Axis-aligned extent of `outline`
    pub extent: BoundingBox,
}

impl GridTile {
    /// Origin corner used for pixel-grid alignment at the given pixel
    /// spacing. The half-pixel shift keeps the external geocoding grid
    /// centered on tile-boundary pixels.
    pub fn alignment_origin(&self, spacing: f64) -> (f64, f64) {
        (
            self.extent.xmax - spacing / 2.0,
            self.extent.ymin + spacing / 2.0,
        )
    }
}

/// Decoded per-tile attribute block.
///
/// The reference scheme packs tile attributes into one free-text
/// description field holding an HTML table. The grammar accepted here:
///
/// ```text
/// block    := cell*                         ; cells in document order
/// cell     := "<td" attrs? ">" text "</td>" ; nested markup is stripped
/// pairs    := (key-cell value-cell)*        ; even cell count required
/// required := TILE_ID, EPSG (integer), UTM_WKT (POLYGON), LL_WKT (POLYGON)
/// ```
///
/// Anything else is a `SchemeParseError`; malformed blocks are never
/// silently skipped since tile geometry could not be trusted afterwards.
#[derive(Debug, Clone)]
pub struct TileAttributes {
    pub tile_id: String,
    pub epsg: u32,
    pub grid_ref: Option<String>,
    pub utm_wkt: String,
    pub ll_wkt: String,
}

impl TileAttributes {
    /// Parse the description block of the tile named `tile`.
    pub fn parse(tile: &str, description: &str) -> ArdResult<Self> {
        let scheme_err = |detail: String| ArdError::SchemeParse {
            tile: tile.to_string(),
            detail,
        };

        // Cells in document order; inner markup stripped, blank cells dropped.
        let cell_re = Regex::new(r"(?is)<td[^>]*>(.*?)</td>").unwrap();
        let tag_re = Regex::new(r"(?s)<[^>]+>").unwrap();
        let cells: Vec<String> = cell_re
            .captures_iter(description)
            .map(|c| tag_re.replace_all(&c[1], "").trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if cells.is_empty() {
            return Err(scheme_err("no attribute cells found".to_string()));
        }
        if cells.len() % 2 != 0 {
            return Err(scheme_err(format!(
                "odd number of attribute cells ({})",
                cells.len()
            )));
        }

        let mut attrib: HashMap<&str, &str> = HashMap::new();
        for pair in cells.chunks(2) {
            attrib.insert(pair[0].as_str(), pair[1].as_str());
        }

        let required = |key: &str| {
            attrib
                .get(key)
                .copied()
                .ok_or_else(|| scheme_err(format!("missing attribute '{}'", key)))
        };

        let tile_id = required("TILE_ID")?.to_string();
        if tile_id != tile {
            return Err(scheme_err(format!(
                "TILE_ID '{}' does not match feature name",
                tile_id
            )));
        }
        let epsg: u32 = required("EPSG")?
            .parse()
            .map_err(|_| scheme_err(format!("EPSG '{}' is not an integer", attrib["EPSG"])))?;

        Ok(Self {
            tile_id,
            epsg,
            grid_ref: attrib.get("MGRS_REF").map(|s| s.to_string()),
            utm_wkt: required("UTM_WKT")?.to_string(),
            ll_wkt: required("LL_WKT")?.to_string(),
        })
    }

    fn into_tile(self) -> ArdResult<GridTile> {
        let scheme_err = |field: &str, e: String| ArdError::SchemeParse {
            tile: self.tile_id.clone(),
            detail: format!("{}: {}", field, e),
        };

        let outline = Polygon::<f64>::try_from_wkt_str(&self.utm_wkt)
            .map_err(|e| scheme_err("UTM_WKT", e.to_string()))?;
        let footprint = Polygon::<f64>::try_from_wkt_str(&self.ll_wkt)
            .map_err(|e| scheme_err("LL_WKT", e.to_string()))?;
        let extent = BoundingBox::from_polygon(&outline)
            .ok_or_else(|| scheme_err("UTM_WKT", "empty polygon".to_string()))?;

        Ok(GridTile {
            id: self.tile_id,
            epsg: self.epsg,
            grid_ref: self.grid_ref,
            footprint,
            outline,
            extent,
        })
    }
}

/// Read-only catalog of the reference tiling scheme.
///
/// Loaded once from the grid KML file at startup and shared by reference
/// for the process lifetime.
#[derive(Debug)]
pub struct GridCatalog {
    tiles: Vec<GridTile>, // sorted by id
    index: HashMap<String, usize>,
}

impl GridCatalog {
    /// Load the tiling scheme from the reference KML file.
    pub fn load<P: AsRef<Path>>(path: P) -> ArdResult<Self> {
        log::info!("Loading tiling scheme: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        Self::from_kml_str(&content)
    }

    /// Parse the tiling scheme from KML content.
    ///
    /// Every `<Placemark>` contributes one tile: `<name>` carries the tile
    /// ID and `<description>` the attribute block decoded by
    /// [`TileAttributes::parse`].
    pub fn from_kml_str(kml: &str) -> ArdResult<Self> {
        let mut reader = Reader::from_str(kml);
        reader.trim_text(true);

        #[derive(PartialEq)]
        enum Capture {
            None,
            Name,
            Description,
        }

        let mut tiles: Vec<GridTile> = Vec::new();
        let mut in_placemark = false;
        let mut capture = Capture::None;
        let mut name = String::new();
        let mut description = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"Placemark" => {
                        in_placemark = true;
                        name.clear();
                        description.clear();
                    }
                    b"name" if in_placemark => capture = Capture::Name,
                    b"description" if in_placemark => capture = Capture::Description,
                    _ => {}
                },
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ArdError::XmlParsing(e.to_string()))?;
                    match capture {
                        Capture::Name => name.push_str(&text),
                        Capture::Description => description.push_str(&text),
                        Capture::None => {}
                    }
                }
                Ok(Event::CData(t)) => {
                    let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                    match capture {
                        Capture::Name => name.push_str(&text),
                        Capture::Description => description.push_str(&text),
                        Capture::None => {}
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"name" | b"description" => capture = Capture::None,
                    b"Placemark" => {
                        in_placemark = false;
                        let tile_name = name.trim().to_string();
                        if tile_name.is_empty() {
                            return Err(ArdError::SchemeParse {
                                tile: "<unnamed>".to_string(),
                                detail: "placemark without a name".to_string(),
                            });
                        }
                        let attrib = TileAttributes::parse(&tile_name, &description)?;
                        tiles.push(attrib.into_tile()?);
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(ArdError::XmlParsing(format!(
                        "Failed to parse tiling scheme KML: {}",
                        e
                    )))
                }
            }
        }

        if tiles.is_empty() {
            return Err(ArdError::EmptyInput(
                "tiling scheme contains no tiles".to_string(),
            ));
        }

        tiles.sort_by(|a, b| a.id.cmp(&b.id));
        let mut index = HashMap::with_capacity(tiles.len());
        for (i, tile) in tiles.iter().enumerate() {
            if index.insert(tile.id.clone(), i).is_some() {
                return Err(ArdError::SchemeParse {
                    tile: tile.id.clone(),
                    detail: "duplicate tile ID in scheme".to_string(),
                });
            }
        }

        log::info!("Tiling scheme loaded: {} tiles", tiles.len());
        Ok(Self { tiles, index })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridTile> {
        self.tiles.iter()
    }

    /// Look up a tile by its identifier.
    pub fn lookup_by_id(&self, id: &str) -> ArdResult<&GridTile> {
        self.index
            .get(id)
            .map(|&i| &self.tiles[i])
            .ok_or_else(|| ArdError::UnknownTile(id.to_string()))
    }

    /// All tiles sharing any area with `geometry` (EPSG:4326), ordered by
    /// tile identifier. Overlap qualifies; full containment is not required.
    pub fn intersecting(&self, geometry: &MultiPolygon<f64>) -> Vec<&GridTile> {
        self.intersecting_filtered(geometry, None)
    }

    /// Like [`Self::intersecting`] with an optional EPSG allow-list
    /// restricting which tile CRSs qualify.
    pub fn intersecting_filtered(
        &self,
        geometry: &MultiPolygon<f64>,
        epsg: Option<&[u32]>,
    ) -> Vec<&GridTile> {
        self.tiles
            .iter()
            .filter(|t| epsg.map_or(true, |codes| codes.contains(&t.epsg)))
            .filter(|t| t.footprint.intersects(geometry))
            .collect()
    }
}
