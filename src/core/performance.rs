use crate::io::annotation::{GeoRefPoint, PointTarget, SourceAnnotation};
use crate::types::{OrbitData, StateVector};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use num_complex::Complex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const SPEED_OF_LIGHT: f64 = 299_792_458.0; // m/s
const WGS84_A: f64 = 6_378_137.0; // semi-major axis, m
const WGS84_E2: f64 = 0.00669437999014; // first eccentricity squared

/// Tuning parameters for quality estimation.
#[derive(Debug, Clone)]
pub struct PerformanceParams {
    /// Sidelobe integration window, samples each side of the main-lobe
    /// peak. Default 64; confirm against reference outputs before claiming
    /// bit-exact compatibility.
    pub islr_window: usize,
    /// Minimum usable impulse-response length, samples
    pub min_samples: usize,
}

impl Default for PerformanceParams {
    fn default() -> Self {
        Self {
            islr_window: 64,
            min_samples: 16,
        }
    }
}

/// Impulse-response measurements along one image axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseResponseMetrics {
    /// -3 dB main-lobe width, meters
    pub resolution_m: f64,
    /// Peak sidelobe ratio, dB (negative: sidelobes below the main peak)
    pub pslr_db: f64,
    /// Integrated sidelobe ratio, dB
    pub islr_db: f64,
}

/// Point-target response measurements for both image axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointTargetMetrics {
    pub range: ImpulseResponseMetrics,
    pub azimuth: ImpulseResponseMetrics,
}

/// Noise-equivalent backscatter floor (sigma nought), dB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseEquivalent {
    pub near_range_db: f64,
    pub far_range_db: f64,
}

/// Geolocation accuracy from header-declared reference points versus the
/// orbit-derived geometric solution. Meters, radar geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocationAccuracy {
    pub range_bias_m: f64,
    pub azimuth_bias_m: f64,
    /// Absent with fewer than two reference points
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_stddev_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azimuth_stddev_m: Option<f64>,
}

/// Per-product quality indicators. Every field is independently optional:
/// a scene without the required calibration data yields the field absent,
/// never an error. Absence is explicit, not a sentinel value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_target: Option<PointTargetMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_equivalent: Option<NoiseEquivalent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<GeolocationAccuracy>,
}

impl PerformanceMetrics {
    pub fn is_empty(&self) -> bool {
        self.point_target.is_none() && self.noise_equivalent.is_none() && self.geolocation.is_none()
    }

    /// Combine per-scene metrics into one product record: the first present
    /// value wins per field.
    pub fn combined(per_scene: &[PerformanceMetrics]) -> PerformanceMetrics {
        PerformanceMetrics {
            point_target: per_scene.iter().find_map(|m| m.point_target.clone()),
            noise_equivalent: per_scene.iter().find_map(|m| m.noise_equivalent.clone()),
            geolocation: per_scene.iter().find_map(|m| m.geolocation.clone()),
        }
    }
}

/// Derives quality indicators from a source scene's annotation record.
///
/// Pure function over a single scene's annotation; holds no cross-scene
/// state and never fails on missing calibration data.
pub struct PerformanceEstimator {
    params: PerformanceParams,
}

impl Default for PerformanceEstimator {
    fn default() -> Self {
        Self::new(PerformanceParams::default())
    }
}

impl PerformanceEstimator {
    pub fn new(params: PerformanceParams) -> Self {
        Self { params }
    }

    /// Estimate all available metrics for one scene. Sub-estimates are
    /// independent; whatever cannot be computed is left absent.
    pub fn estimate(&self, annotation: &SourceAnnotation) -> PerformanceMetrics {
        let metrics = PerformanceMetrics {
            point_target: self.estimate_point_target(annotation),
            noise_equivalent: self.estimate_noise_equivalent(annotation),
            geolocation: self.estimate_geolocation(annotation),
        };
        if metrics.is_empty() {
            log::debug!(
                "scene '{}': no usable calibration data, all metrics absent",
                annotation.scene_id
            );
        }
        metrics
    }

    /// Per-scene estimation across a scene set, in parallel.
    pub fn estimate_all(&self, annotations: &[SourceAnnotation]) -> Vec<PerformanceMetrics> {
        annotations.par_iter().map(|a| self.estimate(a)).collect()
    }

    /// Resolution and sidelobe estimation from embedded point-target
    /// returns. Uses the first target with a measurable response on both
    /// axes; absent when the scene carries no point target.
    fn estimate_point_target(&self, annotation: &SourceAnnotation) -> Option<PointTargetMetrics> {
        for target in &annotation.point_targets {
            if let Some(metrics) = self.analyze_target(target) {
                return Some(metrics);
            }
        }
        None
    }

    fn analyze_target(&self, target: &PointTarget) -> Option<PointTargetMetrics> {
        let range = analyze_response(&target.range_response, target.range_spacing, &self.params)?;
        let azimuth = analyze_response(
            &target.azimuth_response,
            target.azimuth_spacing,
            &self.params,
        )?;
        Some(PointTargetMetrics { range, azimuth })
    }

    /// Noise-equivalent sigma nought from processor-supplied noise and
    /// calibration constants, scaled with incidence angle. Fails closed
    /// when the calibration block is missing.
    fn estimate_noise_equivalent(&self, annotation: &SourceAnnotation) -> Option<NoiseEquivalent> {
        let cal = annotation.calibration.as_ref()?;
        if cal.absolute_constant <= 0.0 || cal.noise_power <= 0.0 {
            log::warn!(
                "scene '{}': non-positive calibration constants, noise estimate absent",
                annotation.scene_id
            );
            return None;
        }

        // NE sigma0 at the reference incidence angle, linear power
        let base = cal.noise_power / cal.absolute_constant;
        let theta_ref = cal.reference_incidence_deg.to_radians();
        if theta_ref.sin() <= 0.0 {
            return None;
        }

        let scaled_db = |theta_deg: f64| -> f64 {
            let scale = theta_deg.to_radians().sin() / theta_ref.sin();
            10.0 * (base * scale).log10()
        };

        let near = annotation
            .incidence_near_deg
            .unwrap_or(cal.reference_incidence_deg);
        let far = annotation
            .incidence_far_deg
            .unwrap_or(cal.reference_incidence_deg);

        Some(NoiseEquivalent {
            near_range_db: scaled_db(near),
            far_range_db: scaled_db(far),
        })
    }

    /// Geolocation accuracy: header-declared reference coordinates against
    /// the orbit-derived solution. Range error is the declared slant range
    /// minus the geometric satellite-to-corner distance; azimuth error is
    /// the along-track component of the line of sight, which is zero for a
    /// perfect zero-Doppler annotation.
    fn estimate_geolocation(&self, annotation: &SourceAnnotation) -> Option<GeolocationAccuracy> {
        let orbit = annotation.orbit.as_ref()?;
        if orbit.state_vectors.is_empty() || annotation.reference_points.is_empty() {
            return None;
        }

        let mut range_errors = Vec::new();
        let mut azimuth_errors = Vec::new();
        for point in &annotation.reference_points {
            if let Some((dr, da)) = reference_point_residuals(orbit, point) {
                range_errors.push(dr);
                azimuth_errors.push(da);
            }
        }
        if range_errors.is_empty() {
            return None;
        }

        Some(GeolocationAccuracy {
            range_bias_m: mean(&range_errors),
            azimuth_bias_m: mean(&azimuth_errors),
            range_stddev_m: stddev(&range_errors),
            azimuth_stddev_m: stddev(&azimuth_errors),
        })
    }
}

/// Measure one impulse-response axis: -3 dB width, PSLR and ISLR.
///
/// The main lobe spans the first power nulls either side of the peak; the
/// sidelobe window extends `islr_window` samples each side. Responses too
/// short to bracket a main lobe are unusable and yield `None`.
fn analyze_response(
    samples: &[Complex<f64>],
    spacing: f64,
    params: &PerformanceParams,
) -> Option<ImpulseResponseMetrics> {
    if samples.len() < params.min_samples || spacing <= 0.0 {
        return None;
    }

    let power: Array1<f64> = samples.iter().map(|z| z.norm_sqr()).collect();
    let n = power.len();

    let peak_idx = power
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)?;
    let peak = power[peak_idx];
    if peak <= 0.0 {
        return None;
    }

    // First null on each side: the first sample where power stops falling.
    let mut left = peak_idx;
    while left > 0 && power[left - 1] < power[left] {
        left -= 1;
    }
    let mut right = peak_idx;
    while right + 1 < n && power[right + 1] < power[right] {
        right += 1;
    }
    if left == peak_idx || right == peak_idx {
        // No descent on one side of the peak: main lobe not bracketed
        return None;
    }
    if left == 0 && right == n - 1 {
        // Monotonic out to both edges: all main lobe, no sidelobes
        return None;
    }

    let lo = peak_idx.saturating_sub(params.islr_window);
    let hi = (peak_idx + params.islr_window).min(n - 1);

    let mainlobe_energy: f64 = power.slice(ndarray::s![left..=right]).sum();
    let window_energy: f64 = power.slice(ndarray::s![lo..=hi]).sum();
    let sidelobe_energy = window_energy - mainlobe_energy;
    if mainlobe_energy <= 0.0 || sidelobe_energy <= 0.0 {
        return None;
    }

    let max_sidelobe = power
        .slice(ndarray::s![lo..=hi])
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let idx = lo + i;
            idx < left || idx > right
        })
        .map(|(_, &p)| p)
        .fold(0.0_f64, f64::max);
    if max_sidelobe <= 0.0 {
        return None;
    }

    Some(ImpulseResponseMetrics {
        resolution_m: half_power_width(&power, peak_idx) * spacing,
        pslr_db: 10.0 * (max_sidelobe / peak).log10(),
        islr_db: 10.0 * (sidelobe_energy / mainlobe_energy).log10(),
    })
}

/// -3 dB width of the main lobe in samples, with linear interpolation at
/// the half-power crossings.
fn half_power_width(power: &Array1<f64>, peak_idx: usize) -> f64 {
    let half = power[peak_idx] / 2.0;
    let n = power.len();

    let mut left = peak_idx as f64;
    for i in (0..peak_idx).rev() {
        if power[i] <= half {
            let frac = (half - power[i]) / (power[i + 1] - power[i]);
            left = i as f64 + frac;
            break;
        }
        left = i as f64;
    }

    let mut right = peak_idx as f64;
    for i in peak_idx + 1..n {
        if power[i] <= half {
            let frac = (power[i - 1] - half) / (power[i - 1] - power[i]);
            right = (i - 1) as f64 + frac;
            break;
        }
        right = i as f64;
    }

    right - left
}

/// Range/azimuth residuals for one declared reference point, meters.
fn reference_point_residuals(orbit: &OrbitData, point: &GeoRefPoint) -> Option<(f64, f64)> {
    let sat = interpolate_state(orbit, point.azimuth_time)?;
    let ground = latlon_to_ecef(point.latitude, point.longitude, 0.0);

    let los = [
        ground[0] - sat.position[0],
        ground[1] - sat.position[1],
        ground[2] - sat.position[2],
    ];
    let geometric_range = (los[0].powi(2) + los[1].powi(2) + los[2].powi(2)).sqrt();
    if geometric_range <= 0.0 {
        return None;
    }

    let declared_range = SPEED_OF_LIGHT * point.slant_range_time / 2.0;
    let range_error = declared_range - geometric_range;

    let speed = (sat.velocity[0].powi(2) + sat.velocity[1].powi(2) + sat.velocity[2].powi(2)).sqrt();
    if speed <= 0.0 {
        return None;
    }
    let azimuth_error =
        (los[0] * sat.velocity[0] + los[1] * sat.velocity[1] + los[2] * sat.velocity[2]) / speed;

    Some((range_error, azimuth_error))
}

/// Linear state-vector interpolation at `time`, clamped to the orbit span.
fn interpolate_state(orbit: &OrbitData, time: DateTime<Utc>) -> Option<StateVector> {
    let svs = &orbit.state_vectors;
    match svs.len() {
        0 => return None,
        1 => return Some(svs[0].clone()),
        _ => {}
    }

    if time <= svs[0].time {
        return Some(svs[0].clone());
    }
    if time >= svs[svs.len() - 1].time {
        return Some(svs[svs.len() - 1].clone());
    }

    let after = svs.iter().position(|sv| sv.time >= time)?;
    let sv1 = &svs[after - 1];
    let sv2 = &svs[after];
    let span = (sv2.time - sv1.time).num_milliseconds() as f64;
    if span <= 0.0 {
        return Some(sv1.clone());
    }
    let fraction = (time - sv1.time).num_milliseconds() as f64 / span;

    Some(StateVector {
        time,
        position: [
            sv1.position[0] + fraction * (sv2.position[0] - sv1.position[0]),
            sv1.position[1] + fraction * (sv2.position[1] - sv1.position[1]),
            sv1.position[2] + fraction * (sv2.position[2] - sv1.position[2]),
        ],
        velocity: [
            sv1.velocity[0] + fraction * (sv2.velocity[0] - sv1.velocity[0]),
            sv1.velocity[1] + fraction * (sv2.velocity[1] - sv1.velocity[1]),
            sv1.velocity[2] + fraction * (sv2.velocity[2] - sv1.velocity[2]),
        ],
    })
}

/// Convert lat/lon/elevation to ECEF coordinates (WGS84)
fn latlon_to_ecef(lat: f64, lon: f64, elevation: f64) -> [f64; 3] {
    let lat_rad = lat.to_radians();
    let lon_rad = lon.to_radians();

    let n = WGS84_A / (1.0 - WGS84_E2 * lat_rad.sin().powi(2)).sqrt();

    let x = (n + elevation) * lat_rad.cos() * lon_rad.cos();
    let y = (n + elevation) * lat_rad.cos() * lon_rad.sin();
    let z = (n * (1.0 - WGS84_E2) + elevation) * lat_rad.sin();

    [x, y, z]
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Sampled sinc impulse response with known sidelobe structure.
    fn sinc_response(n: usize, oversample: f64) -> Vec<Complex<f64>> {
        let center = n as f64 / 2.0;
        (0..n)
            .map(|i| {
                let x = (i as f64 - center) / oversample;
                let v = if x.abs() < 1e-12 {
                    1.0
                } else {
                    (std::f64::consts::PI * x).sin() / (std::f64::consts::PI * x)
                };
                Complex::new(v, 0.0)
            })
            .collect()
    }

    #[test]
    fn test_sinc_pslr_matches_theory() {
        let samples = sinc_response(256, 8.0);
        let metrics = analyze_response(&samples, 1.0, &PerformanceParams::default()).unwrap();
        // First sinc sidelobe in power is -13.26 dB; sampling grid error allowed
        assert_relative_eq!(metrics.pslr_db, -13.26, epsilon = 0.5);
        assert!(metrics.islr_db < 0.0);
        // -3 dB width of sinc^2 is ~0.886 of the oversampled cell
        assert_relative_eq!(metrics.resolution_m, 0.886 * 8.0, epsilon = 0.5);
    }

    #[test]
    fn test_flat_response_unusable() {
        let samples = vec![Complex::new(1.0, 0.0); 64];
        assert!(analyze_response(&samples, 1.0, &PerformanceParams::default()).is_none());
    }

    #[test]
    fn test_half_power_width_with_plateau_at_half() {
        // Samples sitting exactly on the half-power level still yield a
        // finite width: the crossing sample is strictly below its inner
        // neighbor, so the interpolation divisor stays positive
        let power: Array1<f64> = vec![0.25, 0.5, 0.5, 1.0, 0.5, 0.5, 0.25].into();
        let width = half_power_width(&power, 3);
        assert!(width.is_finite());
        assert_relative_eq!(width, 2.0);
    }

    #[test]
    fn test_stddev_needs_two_points() {
        assert!(stddev(&[1.0]).is_none());
        assert_relative_eq!(stddev(&[1.0, 3.0]).unwrap(), std::f64::consts::SQRT_2);
    }
}
