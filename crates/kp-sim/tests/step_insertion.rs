//! Integration test: one-group step reactivity insertion.
//!
//! G=1, lambda=0.1, beta=1 (all delayed), Lambda=2.85e-5, rho=0.1 from t=0.
//! The system is linear with constant coefficients, so n(t) is a sum of two
//! exponentials whose rates are the inhour roots. Checks:
//! - n(t) increases monotonically over [0, 10]
//! - every sample matches the closed form
//! - the late-time growth rate is the dominant inhour root

use kp_core::DelayedNeutronData;
use kp_sim::{HeldReactivity, KineticsSolver, inhour};

const LAMBDA_DECAY: f64 = 0.1;
const GEN_TIME: f64 = 2.85e-5;
const RHO: f64 = 0.1;

/// Both roots of Lambda w^2 + (1 - rho + lambda*Lambda) w - lambda*rho = 0.
fn roots() -> (f64, f64) {
    let b = 1.0 - RHO + LAMBDA_DECAY * GEN_TIME;
    let disc = (b * b + 4.0 * GEN_TIME * LAMBDA_DECAY * RHO).sqrt();
    ((-b + disc) / (2.0 * GEN_TIME), (-b - disc) / (2.0 * GEN_TIME))
}

/// n(t) with n(0) = 1 and n'(0) = rho/Lambda (steady state before the step).
fn closed_form(t: f64) -> f64 {
    let (s1, s2) = roots();
    let dn0 = RHO / GEN_TIME;
    let a1 = (dn0 - s2) / (s1 - s2);
    let a2 = 1.0 - a1;
    a1 * (s1 * t).exp() + a2 * (s2 * t).exp()
}

fn solve() -> kp_sim::Trajectory {
    let data = DelayedNeutronData::single_group(LAMBDA_DECAY, 1.0).unwrap();
    let mut solver = KineticsSolver::new(data, HeldReactivity::new(RHO), GEN_TIME).unwrap();
    solver.solve(0.0, 10.0).expect("step insertion should integrate")
}

#[test]
fn neutron_density_rises_monotonically() {
    let traj = solve();
    let n = traj.neutron_density();
    assert!(n.len() > 10, "expected adaptive samples, got {}", n.len());
    for w in n.windows(2) {
        assert!(w[1] >= w[0] * (1.0 - 1e-6), "n fell from {} to {}", w[0], w[1]);
    }
    assert!(n.last().unwrap() > &1.2);
}

#[test]
fn matches_two_exponential_solution() {
    let traj = solve();
    for s in traj.iter() {
        let exact = closed_form(s.t);
        let n = s.neutron_density();
        assert!(
            (n - exact).abs() <= 1e-3 * exact,
            "t={}: n={n}, exact={exact}",
            s.t
        );
    }
}

#[test]
fn late_growth_rate_is_inhour_root() {
    let traj = solve();
    let mid = traj
        .iter()
        .find(|s| s.t >= 5.0)
        .expect("sample after t=5");
    let end = traj.last().unwrap();
    let rate = (end.neutron_density() / mid.neutron_density()).ln() / (end.t - mid.t);

    let data = DelayedNeutronData::single_group(LAMBDA_DECAY, 1.0).unwrap();
    let pk = kp_sim::PointKinetics::new(data, GEN_TIME).unwrap();
    let omega = inhour::dominant_root(&pk, RHO).unwrap();
    assert!((omega - roots().0).abs() < 1e-9 * omega);
    assert!(
        (rate - omega).abs() < 1e-3 * omega,
        "rate={rate}, omega={omega}"
    );
}

#[test]
fn prompt_jump_is_reached_quickly() {
    let traj = solve();
    let after = traj
        .iter()
        .find(|s| s.t >= 1e-3)
        .expect("sample after prompt transient");
    let pj = kp_sim::prompt_jump(0.0, RHO, 1.0).unwrap();
    assert!((after.neutron_density() - pj).abs() < 1e-2 * pj);
}
