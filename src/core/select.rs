use crate::core::footprint::{FootprintResolver, Scene};
use crate::io::grid::{GridCatalog, GridTile};
use crate::types::{ArdError, ArdResult, BoundingBox};
use geo::{Intersects, MultiPolygon};
use geojson::GeoJson;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;

/// Area-of-interest specification for one processing run.
///
/// Exactly one mode is active; `None` triggers footprint-based derivation
/// from the input scenes.
#[derive(Debug, Clone)]
pub enum AoiSpec {
    /// Explicit tile identifiers, validated against the catalog
    TileIds(Vec<String>),
    /// Arbitrary AOI geometry in geographic coordinates
    Geometry(MultiPolygon<f64>),
    /// No AOI supplied
    None,
}

impl AoiSpec {
    /// Parse a comma-separated tile-ID list, e.g. `"32TNS,32TMS"`.
    pub fn from_tile_list(list: &str) -> Self {
        AoiSpec::TileIds(
            list.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Resolve possibly-conflicting user inputs into the single active
    /// mode: an explicit tile-ID list wins over a supplied geometry, and
    /// with neither the footprint fallback applies.
    pub fn resolve(tile_ids: Option<&str>, geometry: Option<MultiPolygon<f64>>) -> Self {
        match (tile_ids, geometry) {
            (Some(list), geometry) => {
                if geometry.is_some() {
                    log::warn!("Both tile IDs and an AOI geometry supplied; the tile IDs win");
                }
                Self::from_tile_list(list)
            }
            (None, Some(geometry)) => AoiSpec::Geometry(geometry),
            (None, None) => AoiSpec::None,
        }
    }

    /// Read an AOI geometry from a GeoJSON file holding a single Polygon,
    /// a MultiPolygon, or a FeatureCollection thereof.
    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> ArdResult<Self> {
        let content = std::fs::read_to_string(&path)?;
        let geojson: GeoJson = content
            .parse()
            .map_err(|e| ArdError::InvalidFormat(format!("invalid AOI GeoJSON: {}", e)))?;
        let polygons = collect_polygons(&geojson)?;
        if polygons.0.is_empty() {
            return Err(ArdError::EmptyInput(format!(
                "AOI file '{}' contains no polygon geometry",
                path.as_ref().display()
            )));
        }
        Ok(AoiSpec::Geometry(polygons))
    }
}

fn collect_polygons(geojson: &GeoJson) -> ArdResult<MultiPolygon<f64>> {
    let mut polygons = Vec::new();
    let mut push_geometry = |geom: &geojson::Geometry| -> ArdResult<()> {
        match &geom.value {
            geojson::Value::Polygon(_) => {
                let p: geo::Polygon<f64> = geom.value.clone().try_into().map_err(
                    |e: geojson::Error| ArdError::InvalidFormat(e.to_string()),
                )?;
                polygons.push(p);
            }
            geojson::Value::MultiPolygon(_) => {
                let mp: MultiPolygon<f64> = geom.value.clone().try_into().map_err(
                    |e: geojson::Error| ArdError::InvalidFormat(e.to_string()),
                )?;
                polygons.extend(mp.0);
            }
            other => {
                return Err(ArdError::InvalidFormat(format!(
                    "unsupported AOI geometry type: {}",
                    other.type_name()
                )))
            }
        }
        Ok(())
    };

    match geojson {
        GeoJson::Geometry(g) => push_geometry(g)?,
        GeoJson::Feature(f) => {
            if let Some(g) = &f.geometry {
                push_geometry(g)?;
            }
        }
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(g) = &feature.geometry {
                    push_geometry(g)?;
                }
            }
        }
    }
    Ok(MultiPolygon::new(polygons))
}

/// Tuning parameters for tile selection.
#[derive(Debug, Clone)]
pub struct SelectorParams {
    /// Fractional growth of the tile extent used to derive the padded
    /// working extent; the additive margin per side is
    /// `padding_ratio * min(width, height) / 2`. The external geocoding
    /// grid is not pixel-exact, so the working extent must over-cover the
    /// tile before the final crop. Default 0.2; confirm against reference
    /// outputs before claiming bit-exact compatibility.
    pub padding_ratio: f64,
    /// Target pixel spacing in meters, used for grid-origin alignment
    pub spacing: f64,
    /// Optional EPSG allow-list restricting tile selection
    pub epsg_filter: Option<Vec<u32>>,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            padding_ratio: 0.2,
            spacing: 10.0,
            epsg_filter: None,
        }
    }
}

/// A grid tile bound to one processing run.
///
/// Carries the padded working extent handed to the external geocoding
/// engine and the subset of input scenes intersecting the tile. Discarded
/// after the run.
#[derive(Debug, Clone)]
pub struct ProcessingTile {
    pub tile: GridTile,
    /// Working extent in the tile's native CRS; always contains the tile
    /// extent so the cropped output raster is fully covered
    pub extent: BoundingBox,
    pub epsg: u32,
    /// Pixel-grid origin corner `(x, y)` for the geocoding engine
    pub align_origin: (f64, f64),
    /// Input scenes whose footprint intersects this tile
    pub scenes: Vec<Scene>,
}

/// Resolves an AOI specification into the ordered set of tiles to process.
pub struct TileSelector;

impl TileSelector {
    /// Deterministic, idempotent tile resolution.
    ///
    /// Precedence: explicit tile IDs override a supplied geometry; a
    /// geometry overrides footprint derivation; with neither, the combined
    /// scene footprint selects the tiles. The result is sorted by tile
    /// identifier and deduplicated, so identical inputs yield identical
    /// tile sets across runs and hosts.
    pub fn select(
        aoi: &AoiSpec,
        catalog: &GridCatalog,
        scenes: &[Scene],
        params: &SelectorParams,
    ) -> ArdResult<Vec<ProcessingTile>> {
        let tiles: Vec<GridTile> = match aoi {
            AoiSpec::TileIds(ids) => {
                if ids.is_empty() {
                    return Err(ArdError::EmptyInput("empty tile-ID list".to_string()));
                }
                // BTreeSet gives dedup + sorted order in one pass
                let unique: BTreeSet<&str> = ids.iter().map(|s| s.as_str()).collect();
                unique
                    .into_iter()
                    .map(|id| catalog.lookup_by_id(id).cloned())
                    .collect::<ArdResult<Vec<_>>>()?
            }
            AoiSpec::Geometry(geometry) => catalog
                .intersecting_filtered(geometry, params.epsg_filter.as_deref())
                .into_iter()
                .cloned()
                .collect(),
            AoiSpec::None => {
                let union = FootprintResolver::union_extent(scenes)?;
                catalog
                    .intersecting_filtered(&union, params.epsg_filter.as_deref())
                    .into_iter()
                    .cloned()
                    .collect()
            }
        };

        log::info!("Tile selection resolved {} tile(s)", tiles.len());

        // Tiles are data-independent; bind scenes and extents in parallel.
        let processing_tiles: Vec<ProcessingTile> = tiles
            .into_par_iter()
            .map(|tile| Self::bind_tile(tile, scenes, params))
            .collect();

        Ok(processing_tiles)
    }

    fn bind_tile(tile: GridTile, scenes: &[Scene], params: &SelectorParams) -> ProcessingTile {
        let margin =
            params.padding_ratio * tile.extent.width().min(tile.extent.height()) / 2.0;
        let extent = tile.extent.padded(margin);
        let align_origin = tile.alignment_origin(params.spacing);
        let tile_scenes: Vec<Scene> = scenes
            .iter()
            .filter(|s| s.footprint.intersects(&tile.footprint))
            .cloned()
            .collect();

        log::debug!(
            "Tile {}: {} intersecting scene(s), working extent {:.1}x{:.1}",
            tile.id,
            tile_scenes.len(),
            extent.width(),
            extent.height()
        );

        ProcessingTile {
            epsg: tile.epsg,
            extent,
            align_origin,
            scenes: tile_scenes,
            tile,
        }
    }

    /// Overall grid-alignment origin across the selected tiles
    /// (max origin x, min origin y), handed to the geocoding engine so all
    /// tiles share one pixel grid.
    pub fn grid_alignment(tiles: &[ProcessingTile]) -> Option<(f64, f64)> {
        let mut iter = tiles.iter();
        let first = iter.next()?;
        let mut origin = first.align_origin;
        for t in iter {
            origin.0 = origin.0.max(t.align_origin.0);
            origin.1 = origin.1.min(t.align_origin.1);
        }
        Some(origin)
    }
}
