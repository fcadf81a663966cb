//! Runtime configuration, loaded from YAML.
//!
//! Every field has a default, so a config file only needs the values that
//! differ from them:
//!
//! ```yaml
//! camera:
//!   width: 1280
//!   height: 720
//!   hfov_deg: 70.0
//!   support_plane: { axis: z, altitude: 0.0 }
//! association:
//!   gating_distance: 1.5
//!   pruning: { policy: idle_for, seconds: 120.0 }
//! particle_filter:
//!   num_particles: 1000
//! ```

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::geometry::{AxisConvention, CameraIntrinsics, Localizer, SupportPlane};

/// Longest accepted prediction tick, one day.
pub const MAX_PREDICT_INTERVAL_S: f64 = 86_400.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub camera: CameraConfig,
    pub association: AssociationConfig,
    pub particle_filter: ParticleFilterConfig,
    pub service: ServiceConfig,
}

impl FusionConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: FusionConfig =
            serde_yaml::from_str(yaml).context("Failed to parse fusion config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config: FusionConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the estimators meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            bail!("Camera resolution must be non-zero");
        }
        if !(self.camera.hfov_deg > 0.0 && self.camera.hfov_deg < 180.0) {
            bail!("Horizontal field of view must be in (0, 180), got {}", self.camera.hfov_deg);
        }
        if let Some(f) = self.camera.focal_px {
            if f <= 0.0 {
                bail!("Focal length must be positive, got {}", f);
            }
        }
        if self.camera.zoom <= 0.0 {
            bail!("Zoom level must be positive, got {}", self.camera.zoom);
        }
        let assoc = &self.association;
        for (name, value) in [
            ("Gating distance", assoc.gating_distance),
            ("Tie epsilon", assoc.tie_epsilon),
            ("Pixel gate", assoc.pixel_gate),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                bail!("{} must be finite and non-negative, got {}", name, value);
            }
        }
        let pf = &self.particle_filter;
        if pf.num_particles == 0 {
            bail!("Particle count must be at least 1");
        }
        if !(pf.center_sigma_px.is_finite() && pf.center_sigma_px > 0.0)
            || !(pf.radius_sigma_px.is_finite() && pf.radius_sigma_px > 0.0)
        {
            bail!("Likelihood sigmas must be finite and positive");
        }
        if !(0.0..=1.0).contains(&pf.resample_threshold) {
            bail!("Resample threshold is a fraction of the particle count, got {}", pf.resample_threshold);
        }
        if pf.size_min <= 0.0 || pf.size_max < pf.size_min {
            bail!("Size prior must satisfy 0 < size_min <= size_max");
        }
        if pf.prior_half_extent.iter().any(|h| *h < 0.0) {
            bail!("Prior half extents must be non-negative");
        }
        if self.service.queue_capacity == 0 || self.service.pose_buffer_capacity == 0 {
            bail!("Service queue and pose buffer capacities must be at least 1");
        }
        let interval = self.service.predict_interval_s;
        if !(interval > 0.0 && interval <= MAX_PREDICT_INTERVAL_S) {
            bail!(
                "Prediction interval must be in (0, {}] seconds, got {}",
                MAX_PREDICT_INTERVAL_S,
                interval
            );
        }
        Ok(())
    }
}

// ============================================================================
// Camera
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    /// Horizontal field of view at 1x zoom.
    pub hfov_deg: f64,
    /// Explicit focal length in pixels; overrides `hfov_deg` and `zoom`.
    pub focal_px: Option<f64>,
    pub zoom: f64,
    pub convention: AxisConvention,
    pub support_plane: SupportPlane,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            hfov_deg: 90.0,
            focal_px: None,
            zoom: 1.0,
            convention: AxisConvention::default(),
            support_plane: SupportPlane::default(),
        }
    }
}

impl CameraConfig {
    pub fn intrinsics(&self) -> CameraIntrinsics {
        match self.focal_px {
            Some(f) => CameraIntrinsics::from_focal_length(f, self.width, self.height),
            None => CameraIntrinsics::from_zoom_level(self.zoom, self.hfov_deg, self.width, self.height),
        }
    }

    pub fn localizer(&self) -> Localizer {
        Localizer::new(self.intrinsics(), self.convention, self.support_plane)
    }
}

// ============================================================================
// Association
// ============================================================================

/// What happens to tracks that stop receiving measurements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PruningPolicy {
    /// Tracks persist for the whole mission.
    #[default]
    Never,
    /// Drop tracks whose last measurement is older than `seconds` of manager clock.
    IdleFor { seconds: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Max world distance between a measurement and a static track.
    pub gating_distance: f64,
    /// Distances closer than this are considered equal when picking a track.
    pub tie_epsilon: f64,
    /// Max pixel distance between a box centre and a dynamic track's projection.
    pub pixel_gate: f64,
    pub pruning: PruningPolicy,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            gating_distance: 1.0,
            tie_epsilon: 1e-9,
            pixel_gate: 250.0,
            pruning: PruningPolicy::Never,
        }
    }
}

// ============================================================================
// Particle filter
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleFilterConfig {
    /// Fixed for the lifetime of a filter.
    pub num_particles: usize,
    /// Process noise densities, per sqrt(second).
    pub position_noise: f64,
    pub velocity_noise: f64,
    pub size_noise: f64,
    /// Observation noise on the box centre and apparent radius, in pixels.
    pub center_sigma_px: f64,
    pub radius_sigma_px: f64,
    /// Resample when ESS < threshold * N.
    pub resample_threshold: f64,
    /// Uniform prior box over target position.
    pub prior_center: [f64; 3],
    pub prior_half_extent: [f64; 3],
    /// Uniform prior over target radius.
    pub size_min: f64,
    pub size_max: f64,
    pub initial_velocity_std: f64,
    /// Upper bound on tempering stages in one update.
    pub max_annealing_stages: usize,
    pub seed: u64,
}

impl Default for ParticleFilterConfig {
    fn default() -> Self {
        Self {
            num_particles: 500,
            position_noise: 0.01,
            velocity_noise: 0.02,
            size_noise: 0.005,
            center_sigma_px: 4.0,
            radius_sigma_px: 2.0,
            resample_threshold: 0.5,
            prior_center: [0.0, 0.0, 0.0],
            prior_half_extent: [10.0, 10.0, 10.0],
            size_min: 0.1,
            size_max: 1.0,
            initial_velocity_std: 0.05,
            max_annealing_stages: 30,
            seed: 0,
        }
    }
}

impl ParticleFilterConfig {
    pub fn prior_center(&self) -> Vector3<f64> {
        Vector3::from(self.prior_center)
    }

    pub fn prior_half_extent(&self) -> Vector3<f64> {
        Vector3::from(self.prior_half_extent)
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bounded command queue in front of the fusion worker.
    pub queue_capacity: usize,
    /// Cadence of prediction ticks for dynamic tracks.
    pub predict_interval_s: f64,
    pub pose_buffer_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            predict_interval_s: 0.5,
            pose_buffer_capacity: 64,
        }
    }
}
