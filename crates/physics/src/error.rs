use thiserror::Error;

use crate::tableau::IntegratorMethod;

/// Fatal engine conditions.
///
/// Recoverable conditions inside a step (cell saturation, step subdivision
/// depth, skipped frames) never surface here, they are collapsed into
/// counters on the simulation context.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// A Butcher tableau failed its consistency checks (row sums of `a`
    /// must equal `c`, both weight vectors must sum to one).
    #[error("inconsistent Butcher tableau for {method:?}: {detail}")]
    TableauInconsistent {
        method: IntegratorMethod,
        detail: &'static str,
    },
}
