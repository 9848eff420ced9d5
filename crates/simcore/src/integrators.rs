use crate::SimContext;

/// Position and velocity of a single scalar degree of freedom.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DofState {
    pub position: f64,
    pub velocity: f64,
}

/// A generic integration strategy trait.
pub trait Integrator {
    /// Advances the state by one timestep under a constant acceleration.
    fn step(&self, ctx: &SimContext, state: &mut DofState, acceleration: f64);
}

/// Semi-implicit Euler integrator (Symplectic Euler).
/// First-order accurate, but stable for stiff joint servos at small timesteps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemiImplicitEuler;

impl Integrator for SemiImplicitEuler {
    fn step(&self, ctx: &SimContext, state: &mut DofState, acceleration: f64) {
        // Semi-implicit: use the NEW velocity to update position.
        state.velocity += acceleration * ctx.dt;
        state.position += state.velocity * ctx.dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_semi_implicit_euler_uses_new_velocity() {
        let mut state = DofState { position: 0.0, velocity: 1.0 };
        let ctx = SimContext { dt: 0.1, t: 0.0 };

        SemiImplicitEuler.step(&ctx, &mut state, 2.0);

        assert_relative_eq!(state.velocity, 1.2, epsilon = 1e-12);
        assert_relative_eq!(state.position, 0.12, epsilon = 1e-12);
    }
}
