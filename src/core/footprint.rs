use crate::io::annotation::SourceAnnotation;
use crate::types::{ArdError, ArdResult, BoundingBox};
use geo::{BooleanOps, MultiPolygon, Polygon};

/// Scene view used by tile selection: identifier plus geographic footprint.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub footprint: Polygon<f64>,
}

impl Scene {
    pub fn new(id: impl Into<String>, footprint: Polygon<f64>) -> Self {
        Self {
            id: id.into(),
            footprint,
        }
    }

    /// Build the selection view from a parsed annotation record. Fails when
    /// the annotation declares no footprint, since the scene could not take
    /// part in any spatial operation.
    pub fn from_annotation(annotation: &SourceAnnotation) -> ArdResult<Self> {
        let footprint = annotation.footprint.clone().ok_or_else(|| {
            ArdError::InvalidFormat(format!(
                "scene '{}' declares no footprint",
                annotation.scene_id
            ))
        })?;
        Ok(Self {
            id: annotation.scene_id.clone(),
            footprint,
        })
    }
}

/// Computes combined geographic footprints over a set of input scenes.
pub struct FootprintResolver;

impl FootprintResolver {
    /// True geometric union of all scene footprints.
    ///
    /// A union, not a bounding box: scenes that are non-rectangular in
    /// geographic coordinates would otherwise pull in distant tiles.
    pub fn union_extent(scenes: &[Scene]) -> ArdResult<MultiPolygon<f64>> {
        let mut iter = scenes.iter();
        let first = iter.next().ok_or_else(|| {
            ArdError::EmptyInput("no scenes to derive a footprint from".to_string())
        })?;

        let mut combined = MultiPolygon::new(vec![first.footprint.clone()]);
        for scene in iter {
            combined = combined.union(&MultiPolygon::new(vec![scene.footprint.clone()]));
        }

        log::debug!(
            "Footprint union of {} scene(s): {} part(s)",
            scenes.len(),
            combined.0.len()
        );
        Ok(combined)
    }

    /// Maximum axis-aligned extent over the scene footprints, optionally
    /// buffered on every side. Used for DEM preparation by the external
    /// processing engine.
    pub fn max_extent(scenes: &[Scene], buffer: Option<f64>) -> ArdResult<BoundingBox> {
        let mut iter = scenes.iter();
        let first = iter.next().ok_or_else(|| {
            ArdError::EmptyInput("no scenes to derive an extent from".to_string())
        })?;

        let mut max_ext = BoundingBox::from_polygon(&first.footprint).ok_or_else(|| {
            ArdError::InvalidFormat(format!("scene '{}' has an empty footprint", first.id))
        })?;
        for scene in iter {
            let ext = BoundingBox::from_polygon(&scene.footprint).ok_or_else(|| {
                ArdError::InvalidFormat(format!("scene '{}' has an empty footprint", scene.id))
            })?;
            max_ext.xmin = max_ext.xmin.min(ext.xmin);
            max_ext.ymin = max_ext.ymin.min(ext.ymin);
            max_ext.xmax = max_ext.xmax.max(ext.xmax);
            max_ext.ymax = max_ext.ymax.max(ext.ymax);
        }

        Ok(match buffer {
            Some(b) => max_ext.padded(b),
            None => max_ext,
        })
    }
}
