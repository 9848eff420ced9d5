//! Planar two-link (2R) kinematics
//!
//! Closed-form forward and inverse kinematics for a serial chain of two
//! revolute joints with the base fixed at the origin:
//! - `theta1` is measured from the +X axis to link 1
//! - `theta2` is the relative angle from link 1 to link 2
//!
//! Angles are never wrapped; callers may pass values beyond ±π.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance on the law-of-cosines term when deciding reachability.
/// Targets on the workspace boundary land within this of ±1.
pub const WORKSPACE_TOLERANCE: f64 = 1e-9;

/// Targets closer than this to the base (m) have no defined bearing.
pub const DEGENERATE_RADIUS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryError {
    #[error("link lengths must be positive and finite, got l1 = {l1}, l2 = {l2}")]
    InvalidLinkLength { l1: f64, l2: f64 },
}

/// Joint angles of the chain (rad).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointConfiguration {
    pub theta1: f64,
    pub theta2: f64,
}

impl JointConfiguration {
    pub fn new(theta1: f64, theta2: f64) -> Self {
        Self { theta1, theta2 }
    }

    /// Sum of squared joint-space distances, each wrapped to (-π, π].
    pub fn wrapped_distance_sq(&self, other: &JointConfiguration) -> f64 {
        wrap_angle(self.theta1 - other.theta1).powi(2)
            + wrap_angle(self.theta2 - other.theta2).powi(2)
    }
}

/// End-effector position in the plane (m).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EndEffectorPose {
    pub x: f64,
    pub y: f64,
}

impl EndEffectorPose {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance from the chain base.
    pub fn radius(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn to_point(self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    pub fn distance_to(&self, other: &EndEffectorPose) -> f64 {
        nalgebra::distance(&self.to_point(), &other.to_point())
    }
}

impl From<Point2<f64>> for EndEffectorPose {
    fn from(p: Point2<f64>) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// Which of the two elbow configurations to solve for.
///
/// `ElbowDown` puts `theta2` in [0, π] (the elbow sits clockwise of the
/// base-to-target line), `ElbowUp` in [-π, 0].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElbowBranch {
    ElbowUp,
    ElbowDown,
}

impl ElbowBranch {
    pub fn other(self) -> Self {
        match self {
            ElbowBranch::ElbowUp => ElbowBranch::ElbowDown,
            ElbowBranch::ElbowDown => ElbowBranch::ElbowUp,
        }
    }

    fn sign(self) -> f64 {
        match self {
            ElbowBranch::ElbowUp => -1.0,
            ElbowBranch::ElbowDown => 1.0,
        }
    }
}

/// Why an inverse-kinematics query produced no configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum IkFailure {
    /// Target outside the annulus `[|l1 - l2|, l1 + l2]`.
    #[error("target is outside the reachable workspace")]
    OutOfWorkspace,
    /// Target at the chain base, where the bearing angle is undefined.
    #[error("target coincides with the chain base")]
    DegenerateGeometry,
}

/// Outcome of an inverse-kinematics query.
///
/// Invalid solutions carry a zero placeholder configuration that must never
/// be commanded; check [`IkSolution::is_valid`] first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IkSolution {
    configuration: JointConfiguration,
    failure: Option<IkFailure>,
}

impl IkSolution {
    pub fn valid(configuration: JointConfiguration) -> Self {
        Self { configuration, failure: None }
    }

    pub fn invalid(failure: IkFailure) -> Self {
        Self {
            configuration: JointConfiguration::default(),
            failure: Some(failure),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.failure.is_none()
    }

    /// The solved configuration, or the zero placeholder when invalid.
    pub fn configuration(&self) -> JointConfiguration {
        self.configuration
    }

    pub fn failure(&self) -> Option<IkFailure> {
        self.failure
    }

    pub fn into_result(self) -> Result<JointConfiguration, IkFailure> {
        match self.failure {
            None => Ok(self.configuration),
            Some(failure) => Err(failure),
        }
    }
}

/// Wraps an angle to (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

/// Forward kinematics of a 2R chain.
pub fn forward(theta1: f64, theta2: f64, l1: f64, l2: f64) -> EndEffectorPose {
    let theta12 = theta1 + theta2;
    EndEffectorPose {
        x: l1 * theta1.cos() + l2 * theta12.cos(),
        y: l1 * theta1.sin() + l2 * theta12.sin(),
    }
}

/// Closed-form inverse kinematics of a 2R chain.
///
/// Solves `a·cos(θ12) + b·sin(θ12) = -c` for the absolute angle of link 2,
/// then recovers `theta1` from the elbow position. Reachability is decided
/// before `acos` is evaluated.
pub fn inverse(x: f64, y: f64, l1: f64, l2: f64, branch: ElbowBranch) -> IkSolution {
    if x.hypot(y) < DEGENERATE_RADIUS {
        return IkSolution::invalid(IkFailure::DegenerateGeometry);
    }

    let a = 2.0 * x * l2;
    let b = 2.0 * y * l2;
    let c = l1 * l1 - x * x - y * y - l2 * l2;
    let psi = b.atan2(a);
    let d = -c / a.hypot(b);

    if !(-1.0 - WORKSPACE_TOLERANCE..=1.0 + WORKSPACE_TOLERANCE).contains(&d) {
        return IkSolution::invalid(IkFailure::OutOfWorkspace);
    }

    let theta12 = psi + branch.sign() * d.clamp(-1.0, 1.0).acos();
    let theta1 = ((y - l2 * theta12.sin()) / l1).atan2((x - l2 * theta12.cos()) / l1);

    IkSolution::valid(JointConfiguration {
        theta1,
        theta2: theta12 - theta1,
    })
}

/// Link lengths of a planar 2R chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkChainGeometry {
    l1: f64,
    l2: f64,
}

impl LinkChainGeometry {
    pub fn new(l1: f64, l2: f64) -> Result<Self, GeometryError> {
        let ok = |l: f64| l.is_finite() && l > 0.0;
        if !ok(l1) || !ok(l2) {
            return Err(GeometryError::InvalidLinkLength { l1, l2 });
        }
        Ok(Self { l1, l2 })
    }

    pub fn l1(&self) -> f64 {
        self.l1
    }

    pub fn l2(&self) -> f64 {
        self.l2
    }

    /// Inner radius of the reachable annulus.
    pub fn reach_min(&self) -> f64 {
        (self.l1 - self.l2).abs()
    }

    /// Outer radius of the reachable annulus.
    pub fn reach_max(&self) -> f64 {
        self.l1 + self.l2
    }

    pub fn is_reachable(&self, target: EndEffectorPose) -> bool {
        self.inverse(target, ElbowBranch::ElbowUp).is_valid()
    }

    pub fn forward(&self, joints: JointConfiguration) -> EndEffectorPose {
        forward(joints.theta1, joints.theta2, self.l1, self.l2)
    }

    /// Position of the joint between link 1 and link 2.
    pub fn elbow_position(&self, joints: JointConfiguration) -> Point2<f64> {
        Point2::origin() + Vector2::new(joints.theta1.cos(), joints.theta1.sin()) * self.l1
    }

    pub fn inverse(&self, target: EndEffectorPose, branch: ElbowBranch) -> IkSolution {
        inverse(target.x, target.y, self.l1, self.l2, branch)
    }

    /// Both elbow solutions, `[ElbowUp, ElbowDown]`.
    pub fn inverse_both(&self, target: EndEffectorPose) -> [IkSolution; 2] {
        [
            self.inverse(target, ElbowBranch::ElbowUp),
            self.inverse(target, ElbowBranch::ElbowDown),
        ]
    }

    /// The valid solution closest in joint space to `reference`.
    pub fn inverse_nearest(
        &self,
        target: EndEffectorPose,
        reference: JointConfiguration,
    ) -> IkSolution {
        let [up, down] = self.inverse_both(target);
        if !up.is_valid() {
            // Reachability does not depend on the branch.
            return up;
        }
        let d_up = up.configuration().wrapped_distance_sq(&reference);
        let d_down = down.configuration().wrapped_distance_sq(&reference);
        if d_down < d_up { down } else { up }
    }

    /// Solves every waypoint independently; unreachable ones stay invalid so
    /// batch callers can skip them.
    pub fn solve_path(
        &self,
        waypoints: &[EndEffectorPose],
        branch: ElbowBranch,
    ) -> Vec<IkSolution> {
        let solutions: Vec<IkSolution> =
            waypoints.iter().map(|&p| self.inverse(p, branch)).collect();
        let skipped = solutions.iter().filter(|s| !s.is_valid()).count();
        if skipped > 0 {
            log::debug!("{} of {} waypoints unreachable", skipped, waypoints.len());
        }
        solutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn unit_chain() -> LinkChainGeometry {
        LinkChainGeometry::new(1.0, 1.0).unwrap()
    }

    #[test]
    fn test_forward_straight_arm() {
        let pose = forward(0.0, 0.0, 1.0, 1.0);
        assert_relative_eq!(pose.x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(pose.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_right_angles() {
        let pose = forward(FRAC_PI_2, -FRAC_PI_2, 1.0, 0.5);
        assert_relative_eq!(pose.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(pose.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unreachable_target_is_invalid() {
        let solution = inverse(3.0, 0.0, 1.0, 1.0, ElbowBranch::ElbowUp);
        assert!(!solution.is_valid());
        assert_eq!(solution.failure(), Some(IkFailure::OutOfWorkspace));
        assert_eq!(solution.configuration(), JointConfiguration::default());
    }

    #[test]
    fn test_inside_inner_radius_is_invalid() {
        let solution = inverse(0.2, 0.0, 1.0, 0.5, ElbowBranch::ElbowDown);
        assert_eq!(solution.failure(), Some(IkFailure::OutOfWorkspace));
    }

    #[test]
    fn test_boundary_target_is_valid_and_straight() {
        let solution = inverse(0.0, 2.0, 1.0, 1.0, ElbowBranch::ElbowDown);
        assert!(solution.is_valid());
        let joints = solution.configuration();
        assert_relative_eq!(joints.theta2, 0.0, epsilon = 1e-9);
        assert_relative_eq!(joints.theta1, FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn test_origin_is_degenerate() {
        for branch in [ElbowBranch::ElbowUp, ElbowBranch::ElbowDown] {
            let solution = inverse(0.0, 0.0, 1.0, 1.0, branch);
            assert_eq!(solution.failure(), Some(IkFailure::DegenerateGeometry));
            assert_eq!(solution.into_result(), Err(IkFailure::DegenerateGeometry));
        }
    }

    #[test]
    fn test_branches_differ_for_interior_target() {
        let chain = unit_chain();
        let [up, down] = chain.inverse_both(EndEffectorPose::new(1.0, 1.0));

        let up = up.into_result().unwrap();
        let down = down.into_result().unwrap();
        assert_relative_eq!(down.theta1, 0.0, epsilon = 1e-12);
        assert_relative_eq!(down.theta2, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(up.theta1, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(up.theta2, -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_branches_coincide_at_full_extension() {
        let chain = unit_chain();
        let [up, down] = chain.inverse_both(EndEffectorPose::new(2.0, 0.0));
        assert_relative_eq!(up.configuration().theta2, down.configuration().theta2, epsilon = 1e-9);
        assert_relative_eq!(up.configuration().theta1, down.configuration().theta1, epsilon = 1e-9);
    }

    #[test]
    fn test_branches_coincide_at_full_retraction() {
        let chain = LinkChainGeometry::new(1.0, 0.4).unwrap();
        let [up, down] = chain.inverse_both(EndEffectorPose::new(0.6, 0.0));
        let up = up.into_result().unwrap();
        let down = down.into_result().unwrap();
        assert_relative_eq!(wrap_angle(up.theta2 - down.theta2), 0.0, epsilon = 1e-6);
        assert_relative_eq!(wrap_angle(up.theta2).abs(), PI, epsilon = 1e-6);
    }

    #[test]
    fn test_geometry_rejects_bad_lengths() {
        assert!(LinkChainGeometry::new(0.0, 1.0).is_err());
        assert!(LinkChainGeometry::new(1.0, -2.0).is_err());
        assert!(LinkChainGeometry::new(f64::NAN, 1.0).is_err());
        assert!(LinkChainGeometry::new(0.3, 0.7).is_ok());
    }

    #[test]
    fn test_elbow_position() {
        let chain = LinkChainGeometry::new(2.0, 1.0).unwrap();
        let elbow = chain.elbow_position(JointConfiguration::new(FRAC_PI_2, 1.0));
        assert_relative_eq!(elbow.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(elbow.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_nearest_prefers_reference_branch() {
        let chain = unit_chain();
        let target = EndEffectorPose::new(1.0, 1.0);

        let near_up = chain.inverse_nearest(target, JointConfiguration::new(1.4, -1.4));
        assert!(near_up.configuration().theta2 < 0.0);

        let near_down = chain.inverse_nearest(target, JointConfiguration::new(0.1, 1.4));
        assert!(near_down.configuration().theta2 > 0.0);
    }

    #[test]
    fn test_solve_path_keeps_unreachable_invalid() {
        let chain = unit_chain();
        let path = [
            EndEffectorPose::new(1.5, 0.0),
            EndEffectorPose::new(5.0, 0.0),
            EndEffectorPose::new(0.0, 1.5),
        ];
        let solutions = chain.solve_path(&path, ElbowBranch::ElbowUp);
        let validity: Vec<bool> = solutions.iter().map(|s| s.is_valid()).collect();
        assert_eq!(validity, vec![true, false, true]);
    }

    #[test]
    fn test_wrap_angle() {
        assert_relative_eq!(wrap_angle(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-FRAC_PI_2), -FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(2.0 * PI + 0.25), 0.25, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_inverse_reproduces_forward(
            theta1 in -2.0 * PI..2.0 * PI,
            theta2 in -2.0 * PI..2.0 * PI,
            l1 in 0.2f64..2.0,
            l2 in 0.2f64..2.0,
        ) {
            let target = forward(theta1, theta2, l1, l2);
            prop_assume!(target.radius() > 1e-6);

            let chain = LinkChainGeometry::new(l1, l2).unwrap();
            let reproduced = chain.inverse_both(target).iter().any(|solution| {
                solution.is_valid()
                    && chain.forward(solution.configuration()).distance_to(&target) < 1e-6
            });
            prop_assert!(reproduced);
        }

        #[test]
        fn prop_reachability_matches_annulus(
            l1 in 0.2f64..2.0,
            l2 in 0.2f64..2.0,
            r in 0.0f64..4.5,
            bearing in -PI..PI,
        ) {
            let chain = LinkChainGeometry::new(l1, l2).unwrap();
            let margin = 1e-6;
            prop_assume!((r - chain.reach_max()).abs() > margin);
            prop_assume!((r - chain.reach_min()).abs() > margin);
            prop_assume!(r > DEGENERATE_RADIUS);

            let target = EndEffectorPose::new(r * bearing.cos(), r * bearing.sin());
            let inside = r < chain.reach_max() && r > chain.reach_min();
            prop_assert_eq!(chain.is_reachable(target), inside);
        }
    }
}
