extern crate nalgebra as na;

use sparse_uls_lp::{Bound, LinearProgram, LpError, LpMethod, LpSettings, OctaveSession};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// min -x1 - 2 x2  s.t.  x1 + x2 <= 4,  x1 + 3 x2 <= 6,  x >= 0  ->  (3, 1)
fn vertex_program() -> LinearProgram {
    LinearProgram::new(na::DVector::from_vec(vec![-1.0, -2.0]))
        .with_inequalities(
            na::DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 3.0]),
            na::DVector::from_vec(vec![4.0, 6.0]),
        )
        .with_bounds(vec![Bound::non_negative(); 2])
}

#[test]
fn test_all_engines_agree_on_vertex() {
    init_logger();
    let lp = vertex_program();
    for method in LpMethod::ALL {
        let mut solver = method.create_solver(&LpSettings::default());
        let solution = solver.minimize(&lp).unwrap();
        println!("{}: x = {:?}, objective = {}", method, solution.x.as_slice(), solution.objective);
        assert!((solution.x[0] - 3.0).abs() < 1e-6, "{}", method);
        assert!((solution.x[1] - 1.0).abs() < 1e-6, "{}", method);
        assert!((solution.objective + 5.0).abs() < 1e-6, "{}", method);
    }
}

#[test]
fn test_free_variables_with_redundant_equalities() {
    init_logger();
    // min |x1| + |x2| written with t: the x/t split used by the l1 reformulation
    //   x1 - t1 <= 0, -x1 - t1 <= 0, x2 - t2 <= 0, -x2 - t2 <= 0
    //   x1 + x2 = 1, 2 x1 + 2 x2 = 2
    let c = na::DVector::from_vec(vec![0.0, 0.0, 1.0, 1.0]);
    let a_ub = na::DMatrix::from_row_slice(
        4,
        4,
        &[
            1.0, 0.0, -1.0, 0.0, //
            -1.0, 0.0, -1.0, 0.0, //
            0.0, 1.0, 0.0, -1.0, //
            0.0, -1.0, 0.0, -1.0,
        ],
    );
    let b_ub = na::DVector::zeros(4);
    let a_eq = na::DMatrix::from_row_slice(2, 4, &[1.0, 1.0, 0.0, 0.0, 2.0, 2.0, 0.0, 0.0]);
    let b_eq = na::DVector::from_vec(vec![1.0, 2.0]);
    let lp = LinearProgram::new(c)
        .with_inequalities(a_ub, b_ub)
        .with_equalities(a_eq, b_eq);

    for method in LpMethod::ALL {
        let mut solver = method.create_solver(&LpSettings::default());
        let solution = solver.minimize(&lp).unwrap();
        assert!((solution.objective - 1.0).abs() < 1e-6, "{}", method);
        assert!((solution.x[0] + solution.x[1] - 1.0).abs() < 1e-6, "{}", method);
    }
}

#[test]
fn test_inconsistent_equalities_are_infeasible() {
    init_logger();
    let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0, 1.0]))
        .with_equalities(
            na::DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]),
            na::DVector::from_vec(vec![1.0, 2.0]),
        )
        .with_bounds(vec![Bound::non_negative(); 2]);
    for method in LpMethod::ALL {
        let mut solver = method.create_solver(&LpSettings::default());
        assert_eq!(solver.minimize(&lp).unwrap_err(), LpError::Infeasible, "{}", method);
    }
}

#[test]
fn test_engines_detect_unbounded() {
    init_logger();
    // min -x1  s.t.  x1 - x2 <= 1,  x >= 0
    let lp = LinearProgram::new(na::DVector::from_vec(vec![-1.0, 0.0]))
        .with_inequalities(
            na::DMatrix::from_row_slice(1, 2, &[1.0, -1.0]),
            na::DVector::from_vec(vec![1.0]),
        )
        .with_bounds(vec![Bound::non_negative(); 2]);
    for method in LpMethod::ALL {
        let mut solver = method.create_solver(&LpSettings::default());
        assert_eq!(solver.minimize(&lp).unwrap_err(), LpError::Unbounded, "{}", method);
    }
}

#[test]
fn test_negative_right_hand_side_with_non_negative_variables_is_infeasible() {
    init_logger();
    // x1 + x2 = -1,  x >= 0
    let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0, 1.0]))
        .with_equalities(
            na::DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            na::DVector::from_vec(vec![-1.0]),
        )
        .with_bounds(vec![Bound::non_negative(); 2]);
    for method in LpMethod::ALL {
        let mut solver = method.create_solver(&LpSettings::default());
        assert_eq!(solver.minimize(&lp).unwrap_err(), LpError::Infeasible, "{}", method);
    }
}

#[test]
fn test_reported_objective_includes_bound_shift() {
    init_logger();
    // min x1 + x2  s.t.  x1 + x2 >= 3,  2 <= x1 <= 5,  x2 <= 4  ->  objective 3
    let lp = LinearProgram::new(na::DVector::from_vec(vec![1.0, 1.0]))
        .with_inequalities(
            na::DMatrix::from_row_slice(1, 2, &[-1.0, -1.0]),
            na::DVector::from_vec(vec![-3.0]),
        )
        .with_bounds(vec![Bound::new(Some(2.0), Some(5.0)), Bound::new(None, Some(4.0))]);
    for method in LpMethod::ALL {
        let mut solver = method.create_solver(&LpSettings::default());
        let solution = solver.minimize(&lp).unwrap();
        assert!((solution.objective - 3.0).abs() < 1e-6, "{}", method);
        assert!((solution.objective - lp.c.dot(&solution.x)).abs() < 1e-6, "{}", method);
    }
}

#[test]
fn test_upper_bounds_are_respected() {
    init_logger();
    // min -x1 - x2  s.t.  x1 + x2 <= 3,  0 <= x1 <= 1,  x2 <= 1.5
    let lp = LinearProgram::new(na::DVector::from_vec(vec![-1.0, -1.0]))
        .with_inequalities(
            na::DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            na::DVector::from_vec(vec![3.0]),
        )
        .with_bounds(vec![
            Bound::new(Some(0.0), Some(1.0)),
            Bound::new(None, Some(1.5)),
        ]);
    for method in LpMethod::ALL {
        let mut solver = method.create_solver(&LpSettings::default());
        let solution = solver.minimize(&lp).unwrap();
        assert!((solution.x[0] - 1.0).abs() < 1e-6, "{}", method);
        assert!((solution.x[1] - 1.5).abs() < 1e-6, "{}", method);
    }
}

#[test]
fn test_closed_session_rejects_work() {
    init_logger();
    let lp = vertex_program();
    let mut session = OctaveSession::open(LpSettings::default());
    assert!(session.minimize(&lp).is_ok());
    assert!(session.minimize(&lp).is_ok());
    assert_eq!(session.solves(), 2);

    session.close();
    assert!(!session.is_open());
    assert_eq!(session.minimize(&lp).unwrap_err(), LpError::SessionClosed);
    // Closing twice is harmless
    session.close();
}

#[test]
fn test_method_names() {
    for method in LpMethod::ALL {
        let parsed: LpMethod = method.to_string().to_lowercase().parse().unwrap();
        assert_eq!(parsed, method);
        assert_eq!(method.create_solver(&LpSettings::default()).name().to_uppercase(), method.as_str());
    }
    assert!(matches!("INVALID".parse::<LpMethod>(), Err(LpError::UnknownMethod(_))));
}
