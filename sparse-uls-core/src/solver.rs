extern crate nalgebra as na;

use sparse_uls_lp::LpMethod;

use crate::config::SolverConfig;
use crate::error::UlsResult;
use crate::homotopy::solve_homopoly_timed;
use crate::l1::solve_l1_timed;
use crate::least_p::solve_timed;
use crate::solution::Solution;
use crate::timing::TimingTracker;

/// Runs the solving strategies with one configuration and keeps timing
/// records across calls.
///
/// Each call starts a new timing run; the individual steps (`validate`,
/// `factorize`, `least_p`, `support_reduction`, `homotopy_stage`, `lp_build`,
/// `lp_minimize`) are recorded under it.
///
/// # Example
///
/// ```rust,no_run
/// # use nalgebra as na;
/// # use sparse_uls_core::{SolverConfig, UlsSolver};
/// # use sparse_uls_lp::LpMethod;
/// # fn example(a: &na::DMatrix<f64>, b: &na::DVector<f64>) -> Result<(), Box<dyn std::error::Error>> {
/// let mut solver = UlsSolver::new(SolverConfig::default())?;
/// let sparse = solver.solve(a, b, 1.0)?;
/// let exact = solver.solve_l1(a, b, LpMethod::Scipy)?;
/// println!("{} vs {}", sparse.objective, exact.objective);
/// solver.print_timing_summary();
/// solver.export_step_timings("uls_steps.csv")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UlsSolver {
    config: SolverConfig,
    timing_tracker: TimingTracker,
}

impl UlsSolver {
    /// Creates a solver after validating `config`.
    pub fn new(config: SolverConfig) -> UlsResult<Self> {
        config.validate()?;
        Ok(UlsSolver {
            config,
            timing_tracker: TimingTracker::new(),
        })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// See [`crate::solve`].
    pub fn solve(&mut self, a: &na::DMatrix<f64>, b: &na::DVector<f64>, p: f64) -> UlsResult<Solution> {
        self.timing_tracker.start_run();
        solve_timed(a, b, p, &self.config, &mut self.timing_tracker)
    }

    /// See [`crate::solve_homopoly`].
    pub fn solve_homopoly(
        &mut self,
        a: &na::DMatrix<f64>,
        b: &na::DVector<f64>,
        p: f64,
    ) -> UlsResult<Solution> {
        self.timing_tracker.start_run();
        solve_homopoly_timed(a, b, p, &self.config, &mut self.timing_tracker)
    }

    /// See [`crate::solve_l1`].
    pub fn solve_l1(
        &mut self,
        a: &na::DMatrix<f64>,
        b: &na::DVector<f64>,
        method: LpMethod,
    ) -> UlsResult<Solution> {
        self.timing_tracker.start_run();
        solve_l1_timed(a, b, method, &self.config, &mut self.timing_tracker)
    }

    pub fn timing_tracker(&self) -> &TimingTracker {
        &self.timing_tracker
    }

    pub fn timing_tracker_mut(&mut self) -> &mut TimingTracker {
        &mut self.timing_tracker
    }

    /// Exports step timing data to a CSV file.
    pub fn export_step_timings(&self, filename: &str) -> UlsResult<()> {
        self.timing_tracker.write_step_timings_to_csv(filename)?;
        println!("Exported step timings to: {}", filename);
        Ok(())
    }

    /// Prints average, maximum and count per solver step.
    pub fn print_timing_summary(&self) {
        println!("\n=== Solver Step Timing Summary ===");
        let mut step_stats: Vec<_> = self.timing_tracker.get_step_statistics().into_iter().collect();
        step_stats.sort_by(|a, b| a.0.cmp(&b.0));
        for (step, (avg, max, count)) in step_stats {
            println!(
                "{}: avg={:.2}ms, max={:.2}ms, count={}",
                step, avg, max, count
            );
        }
        println!();
    }
}
