//! Solver configuration.
//!
//! Every field has a default, so a JSON document only needs to name the
//! values it changes:
//!
//! ```rust
//! # use sparse_uls_core::SolverConfig;
//! let config = SolverConfig::from_json_str(r#"{ "lbfgs_memory": 5, "lp": { "max_iterations": 500 } }"#).unwrap();
//! assert_eq!(config.lbfgs_memory, 5);
//! assert_eq!(config.lp.max_iterations, 500);
//! assert!(config.sparsify);
//! ```
use std::path::Path;

use serde::{Deserialize, Serialize};
use sparse_uls_lp::LpSettings;

use crate::error::{UlsError, UlsResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of correction pairs kept by L-BFGS
    pub lbfgs_memory: usize,
    /// L-BFGS iteration budget per stage (smoothing or homotopy stage)
    pub max_iterations: u64,
    /// Stop once `‖∇f‖_∞ <= gradient_tolerance * max(1, |f|)`
    pub gradient_tolerance: f64,
    /// A failed line search at a point with a scaled gradient below this is
    /// treated as converged
    pub stall_tolerance: f64,
    /// Singular value cutoff for the rank check; `None` uses
    /// `max(m, n) * eps * sigma_max`
    pub rank_tolerance: Option<f64>,
    /// Initial smoothing width for `p <= 1`, relative to `max(‖x_p‖_∞, 1)`
    pub smoothing_start: f64,
    /// Final smoothing width, same scale
    pub smoothing_final: f64,
    /// Divisor applied to the smoothing width between stages
    pub smoothing_factor: f64,
    /// Run support reduction after the smoothing continuation
    pub sparsify: bool,
    /// Relative magnitude below which a component counts as zero
    pub support_tolerance: f64,
    /// Penalty weight of the first homotopy stage
    pub homotopy_start: f64,
    /// Multiplier applied to the penalty weight between homotopy stages
    pub homotopy_factor: f64,
    /// Smallest penalty weight of the homotopy schedule
    pub homotopy_final: f64,
    /// Settings handed to the LP engines
    pub lp: LpSettings,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            lbfgs_memory: 10,
            max_iterations: 2_000,
            gradient_tolerance: 1e-10,
            stall_tolerance: 1e-6,
            rank_tolerance: None,
            smoothing_start: 1e-1,
            smoothing_final: 1e-7,
            smoothing_factor: 10.0,
            sparsify: true,
            support_tolerance: 1e-9,
            homotopy_start: 1.0,
            homotopy_factor: 0.1,
            homotopy_final: 1e-10,
            lp: LpSettings::default(),
        }
    }
}

impl SolverConfig {
    pub fn from_json_str(json: &str) -> UlsResult<Self> {
        let config: SolverConfig = serde_json::from_str(json)
            .map_err(|e| UlsError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> UlsResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| UlsError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Checks that every schedule terminates and every tolerance is usable.
    pub fn validate(&self) -> UlsResult<()> {
        fn positive(name: &str, value: f64) -> UlsResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(UlsError::Config(format!("{} must be positive, got {}", name, value)))
            }
        }

        if self.lbfgs_memory == 0 {
            return Err(UlsError::Config("lbfgs_memory must be at least 1".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(UlsError::Config("max_iterations must be at least 1".to_string()));
        }
        positive("gradient_tolerance", self.gradient_tolerance)?;
        positive("stall_tolerance", self.stall_tolerance)?;
        if let Some(tol) = self.rank_tolerance {
            positive("rank_tolerance", tol)?;
        }
        positive("smoothing_start", self.smoothing_start)?;
        positive("smoothing_final", self.smoothing_final)?;
        positive("support_tolerance", self.support_tolerance)?;
        positive("homotopy_start", self.homotopy_start)?;
        positive("homotopy_final", self.homotopy_final)?;

        if self.smoothing_final > self.smoothing_start {
            return Err(UlsError::Config(
                "smoothing_final must not exceed smoothing_start".to_string(),
            ));
        }
        if !(self.smoothing_factor.is_finite() && self.smoothing_factor > 1.0) {
            return Err(UlsError::Config(format!(
                "smoothing_factor must be greater than 1, got {}",
                self.smoothing_factor
            )));
        }
        if self.homotopy_final > self.homotopy_start {
            return Err(UlsError::Config(
                "homotopy_final must not exceed homotopy_start".to_string(),
            ));
        }
        if !(self.homotopy_factor > 0.0 && self.homotopy_factor < 1.0) {
            return Err(UlsError::Config(format!(
                "homotopy_factor must lie in (0, 1), got {}",
                self.homotopy_factor
            )));
        }
        if self.lp.max_iterations == 0 || self.lp.ipm_max_iterations == 0 {
            return Err(UlsError::Config("LP iteration budgets must be positive".to_string()));
        }
        positive("lp.tolerance", self.lp.tolerance)?;
        positive("lp.ipm_tolerance", self.lp.ipm_tolerance)?;
        if !(self.lp.ipm_step_fraction > 0.0 && self.lp.ipm_step_fraction < 1.0) {
            return Err(UlsError::Config(format!(
                "lp.ipm_step_fraction must lie in (0, 1), got {}",
                self.lp.ipm_step_fraction
            )));
        }
        Ok(())
    }

    /// Smoothing widths of the continuation, largest first, scaled by `scale`.
    pub(crate) fn smoothing_schedule(&self, scale: f64) -> Vec<f64> {
        geometric_schedule(
            self.smoothing_start,
            1.0 / self.smoothing_factor,
            self.smoothing_final,
        )
        .into_iter()
        .map(|eps| eps * scale)
        .collect()
    }

    /// Penalty weights of the homotopy, largest first.
    pub(crate) fn homotopy_schedule(&self) -> Vec<f64> {
        geometric_schedule(self.homotopy_start, self.homotopy_factor, self.homotopy_final)
    }
}

/// `start, start*ratio, ...` down to `last`, which is always the final entry.
fn geometric_schedule(start: f64, ratio: f64, last: f64) -> Vec<f64> {
    let mut values = Vec::new();
    let mut value = start;
    // Relative slack so that 1e-1 * 0.1^6 still reaches a final value of 1e-7
    while value > last * (1.0 + 1e-6) {
        values.push(value);
        value *= ratio;
    }
    values.push(last);
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn test_homotopy_schedule_reaches_final_weight() {
        let schedule = SolverConfig::default().homotopy_schedule();
        assert_eq!(schedule.len(), 11);
        assert_eq!(schedule[0], 1.0);
        assert_eq!(*schedule.last().unwrap(), 1e-10);
    }

    #[test]
    fn test_smoothing_schedule_is_scaled() {
        let schedule = SolverConfig::default().smoothing_schedule(2.0);
        assert_eq!(schedule.len(), 7);
        assert!((schedule[0] - 0.2).abs() < 1e-15);
        assert!((schedule[6] - 2e-7).abs() < 1e-20);
    }

    #[test]
    fn test_rejects_bad_factor() {
        let config = SolverConfig {
            homotopy_factor: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(UlsError::Config(_))));
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = SolverConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, UlsError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SolverConfig::from_json_file("/nonexistent/sparse-uls.json").unwrap_err();
        assert!(matches!(err, UlsError::Io(_)));
    }
}
