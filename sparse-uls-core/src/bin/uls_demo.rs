/*
This program generates a random underdetermined system with a sparse ground
truth and solves it with every strategy, reporting residuals, norms, support
sizes and timings.
*/

extern crate nalgebra as na;

use std::error::Error;
use std::time::Instant;

use clap::Parser;
use sparse_uls_core::{
    utils::{random_problem, support_size},
    LpMethod, Solution, SolverConfig, UlsSolver,
};

/// Program to compare the sparse underdetermined system solvers.
///
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The number of rows in A
    #[arg(short, long, default_value_t = 20)]
    m: usize,

    /// The number of columns in A
    #[arg(short, long, default_value_t = 60)]
    n: usize,

    /// The number of non-zero elements in x_true
    #[arg(short, long, default_value_t = 4)]
    k: usize,

    /// Seed for the problem generator
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Norm parameter for the null-space solver
    #[arg(short, long, default_value_t = 1.0)]
    p: f64,

    /// The number of threads to use for problem generation
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Optional JSON solver configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Write step timings to this CSV file
    #[arg(long)]
    timings: Option<String>,

    /// Print each solution as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn report(name: &str, solution: &Solution, a: &na::DMatrix<f64>, b: &na::DVector<f64>, json: bool) {
    println!(
        "[Main] {:<18} residual={:.3e} l1={:.6} l2={:.6} support={} iterations={} ({})",
        name,
        solution.residual_norm(a, b),
        solution.x.lp_norm(1),
        solution.x.norm(),
        support_size(&solution.x, 1e-8),
        solution.iterations,
        solution.convergence
    );
    if json {
        match serde_json::to_string(solution) {
            Ok(text) => println!("{}", text),
            Err(e) => log::error!("[Main] failed to serialize {} solution: {}", name, e),
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SolverConfig::from_json_file(path)?,
        None => SolverConfig::default(),
    };

    let data_gen_start_time = Instant::now();
    println!("[Main] Generating {}x{} system with {} non-zeros...", args.m, args.n, args.k);

    #[cfg(feature = "rayon")]
    let problem = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build()?;
        pool.install(|| random_problem(args.m, args.n, args.k, args.seed))?
    };

    #[cfg(not(feature = "rayon"))]
    let problem = {
        if args.threads > 1 {
            log::warn!("[Main] built without the rayon feature, generating on one thread");
        }
        random_problem(args.m, args.n, args.k, args.seed)?
    };

    println!(
        "[Main] Problem generated in {:?}, ||x_true||_1 = {:.6}",
        data_gen_start_time.elapsed(),
        problem.x_true.lp_norm(1)
    );

    let (a, b) = (&problem.a, &problem.b);
    let mut solver = UlsSolver::new(config)?;

    let solution = solver.solve(a, b, args.p)?;
    report(&format!("solve(p={})", args.p), &solution, a, b, args.json);

    let solution = solver.solve_homopoly(a, b, 2.0)?;
    report("solve_homopoly", &solution, a, b, args.json);

    for method in LpMethod::ALL {
        let solution = solver.solve_l1(a, b, method)?;
        report(&format!("solve_l1({})", method), &solution, a, b, args.json);
    }

    solver.print_timing_summary();
    if let Some(path) = &args.timings {
        solver.export_step_timings(path)?;
    }
    Ok(())
}
