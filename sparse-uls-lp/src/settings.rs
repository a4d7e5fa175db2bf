//! Tolerances and iteration budgets shared by the LP engines.

use serde::{Deserialize, Serialize};

/// Settings consumed by every LP engine. Simplex engines read the
/// `max_iterations`/`tolerance`/pivot fields, the interior-point engine the
/// `ipm_*` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LpSettings {
    /// Maximum number of simplex pivots (both phases together)
    pub max_iterations: usize,
    /// Reduced-cost and feasibility tolerance
    pub tolerance: f64,
    /// Smallest pivot element accepted in a ratio test
    pub pivot_tolerance: f64,
    /// Consecutive degenerate pivots before switching to Bland's rule
    pub bland_after_degenerate: usize,
    /// Pivots between refactorizations of the revised-simplex basis
    pub refactor_interval: usize,
    /// Maximum number of interior-point iterations
    pub ipm_max_iterations: usize,
    /// Relative residual and gap tolerance of the interior-point method
    pub ipm_tolerance: f64,
    /// Fraction of the distance to the boundary taken per step
    pub ipm_step_fraction: f64,
    /// Initial diagonal regularization of the augmented Newton system
    pub ipm_regularization: f64,
}

impl Default for LpSettings {
    fn default() -> Self {
        LpSettings {
            max_iterations: 10_000,
            tolerance: 1e-9,
            pivot_tolerance: 1e-10,
            bland_after_degenerate: 50,
            refactor_interval: 32,
            ipm_max_iterations: 200,
            ipm_tolerance: 1e-9,
            ipm_step_fraction: 0.995,
            ipm_regularization: 1e-10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LpSettings::default();
        assert_eq!(settings.max_iterations, 10_000);
        assert!(settings.ipm_step_fraction < 1.0);
    }
}
