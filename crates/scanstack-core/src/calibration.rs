//! Microscope calibration tables.
//!
//! Zoom-to-field-of-view and laser-power calibrations live in a declarative
//! TOML file, loaded and validated once at stack construction. A lookup the
//! tables do not cover degrades to NaN instead of failing.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Result, ScanStackError};

const ZOOM_EPSILON: f64 = 1e-6;

/// Zoom factor → field-of-view edge length.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct FovEntry {
    pub zoom: f64,
    pub size_um: f64,
}

/// Laser power curve for one excitation wavelength.
#[derive(Clone, Debug, Deserialize)]
pub struct LaserCurve {
    pub wavelength_nm: u32,
    /// (percent, watts) samples, ascending in percent.
    pub curve: Vec<PowerPoint>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PowerPoint {
    pub percent: f64,
    pub watts: f64,
}

/// Calibration tables for one microscope.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Calibration {
    #[serde(default)]
    pub fov: Vec<FovEntry>,
    #[serde(default)]
    pub laser: Vec<LaserCurve>,
}

impl Calibration {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let calibration: Calibration =
            toml::from_str(&text).map_err(|e| ScanStackError::InvalidCalibration(e.to_string()))?;
        for table in &calibration.laser {
            if table.curve.is_empty() {
                return Err(ScanStackError::InvalidCalibration(format!(
                    "laser table for {} nm has an empty power curve",
                    table.wavelength_nm
                )));
            }
        }
        Ok(calibration)
    }

    /// Field-of-view edge length in micrometers at a zoom factor.
    /// An uncalibrated zoom yields NaN.
    pub fn fov_size_um(&self, zoom: f64) -> f64 {
        match self
            .fov
            .iter()
            .find(|entry| (entry.zoom - zoom).abs() < ZOOM_EPSILON)
        {
            Some(entry) => entry.size_um,
            None => {
                warn!(zoom, "no field-of-view calibration for this zoom");
                f64::NAN
            }
        }
    }

    /// Laser power in watts at `percent` for a wavelength, interpolated
    /// linearly within the calibrated curve. An unknown wavelength or a
    /// percentage outside the curve yields NaN.
    pub fn laser_power_watts(&self, wavelength_nm: u32, percent: f64) -> f64 {
        let Some(table) = self
            .laser
            .iter()
            .find(|table| table.wavelength_nm == wavelength_nm)
        else {
            warn!(wavelength_nm, "no laser power calibration for this wavelength");
            return f64::NAN;
        };
        if let [only] = table.curve.as_slice() {
            if (only.percent - percent).abs() < ZOOM_EPSILON {
                return only.watts;
            }
        }
        for pair in table.curve.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if percent >= a.percent && percent <= b.percent {
                let span = b.percent - a.percent;
                if span <= f64::EPSILON {
                    return a.watts;
                }
                return a.watts + (percent - a.percent) / span * (b.watts - a.watts);
            }
        }
        warn!(
            wavelength_nm,
            percent, "power percentage outside the calibrated curve"
        );
        f64::NAN
    }
}
