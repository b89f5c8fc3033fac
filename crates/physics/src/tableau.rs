//! Butcher tableaus for the embedded Runge-Kutta pairs.
//!
//! Five pairs are supported; every tableau carries a second weight vector
//! `b_hat` whose solution difference against `b` estimates the local
//! truncation error.

use crate::error::PhysicsError;
use crate::types::Scalar;

/// Largest stage count across the supported tableaus (Dormand-Prince 5(4)).
pub const MAX_STAGES: usize = 7;

/// Embedded Runge-Kutta pair selector, with the wire codes used by clients.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IntegratorMethod {
    /// Heun-Euler 2(1).
    HeunEuler21 = 0,
    /// Bogacki-Shampine 3(2).
    BogackiShampine32 = 1,
    /// Runge-Kutta-Fehlberg 5(4). Also the fallback for unknown codes.
    RungeKuttaFehlberg54 = 2,
    /// Cash-Karp 5(4).
    CashKarp54 = 3,
    /// Dormand-Prince 5(4).
    DormandPrince54 = 4,
}

impl IntegratorMethod {
    /// Decodes a wire code. Unknown codes fall back to
    /// [`IntegratorMethod::RungeKuttaFehlberg54`].
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::HeunEuler21,
            1 => Self::BogackiShampine32,
            3 => Self::CashKarp54,
            4 => Self::DormandPrince54,
            _ => Self::RungeKuttaFehlberg54,
        }
    }

    /// The wire code of this method.
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// All supported methods, used by tests to sweep the registry.
    pub const ALL: [Self; 5] = [
        Self::HeunEuler21,
        Self::BogackiShampine32,
        Self::RungeKuttaFehlberg54,
        Self::CashKarp54,
        Self::DormandPrince54,
    ];
}

/// Coefficients of one embedded Runge-Kutta pair.
///
/// `a` is lower triangular; rows past `order` are zero padding so all
/// tableaus share one storage layout.
#[derive(Clone, Debug)]
pub struct ButcherTableau {
    /// Number of stages.
    pub order: usize,
    /// Stage coupling matrix.
    pub a: [[Scalar; MAX_STAGES]; MAX_STAGES],
    /// Primary weight vector.
    pub b: [Scalar; MAX_STAGES],
    /// Embedded weight vector used for the error estimate.
    pub b_hat: [Scalar; MAX_STAGES],
    /// Node vector.
    pub c: [Scalar; MAX_STAGES],
}

impl ButcherTableau {
    fn from_rows(
        order: usize,
        a_rows: &[&[Scalar]],
        b: &[Scalar],
        b_hat: &[Scalar],
        c: &[Scalar],
    ) -> Self {
        let mut tableau = Self {
            order,
            a: [[0.0; MAX_STAGES]; MAX_STAGES],
            b: [0.0; MAX_STAGES],
            b_hat: [0.0; MAX_STAGES],
            c: [0.0; MAX_STAGES],
        };
        for (n, row) in a_rows.iter().enumerate() {
            tableau.a[n][..row.len()].copy_from_slice(row);
        }
        tableau.b[..b.len()].copy_from_slice(b);
        tableau.b_hat[..b_hat.len()].copy_from_slice(b_hat);
        tableau.c[..c.len()].copy_from_slice(c);
        tableau
    }

    /// Builds the tableau for the given method.
    #[must_use]
    pub fn for_method(method: IntegratorMethod) -> Self {
        match method {
            IntegratorMethod::HeunEuler21 => Self::from_rows(
                2,
                &[&[], &[1.0]],
                &[1.0 / 2.0, 1.0 / 2.0],
                &[1.0, 0.0],
                &[0.0, 1.0],
            ),
            IntegratorMethod::BogackiShampine32 => Self::from_rows(
                4,
                &[
                    &[],
                    &[1.0 / 2.0],
                    &[0.0, 3.0 / 4.0],
                    &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
                ],
                &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0, 0.0],
                &[7.0 / 24.0, 1.0 / 4.0, 1.0 / 3.0, 1.0 / 8.0],
                &[0.0, 1.0 / 2.0, 3.0 / 4.0, 1.0],
            ),
            IntegratorMethod::CashKarp54 => Self::from_rows(
                6,
                &[
                    &[],
                    &[1.0 / 5.0],
                    &[3.0 / 40.0, 9.0 / 40.0],
                    &[3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0],
                    &[-11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0],
                    &[
                        1631.0 / 55296.0,
                        175.0 / 512.0,
                        575.0 / 13824.0,
                        44275.0 / 110592.0,
                        253.0 / 4096.0,
                    ],
                ],
                &[
                    37.0 / 378.0,
                    0.0,
                    250.0 / 621.0,
                    125.0 / 594.0,
                    0.0,
                    512.0 / 1771.0,
                ],
                &[
                    2825.0 / 27648.0,
                    0.0,
                    18575.0 / 48384.0,
                    13525.0 / 55296.0,
                    277.0 / 14336.0,
                    1.0 / 4.0,
                ],
                &[0.0, 1.0 / 5.0, 3.0 / 10.0, 3.0 / 5.0, 1.0, 7.0 / 8.0],
            ),
            IntegratorMethod::DormandPrince54 => Self::from_rows(
                7,
                &[
                    &[],
                    &[1.0 / 5.0],
                    &[3.0 / 40.0, 9.0 / 40.0],
                    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
                    &[
                        19372.0 / 6561.0,
                        -25360.0 / 2187.0,
                        64448.0 / 6561.0,
                        -212.0 / 729.0,
                    ],
                    &[
                        9017.0 / 3168.0,
                        -355.0 / 33.0,
                        46732.0 / 5247.0,
                        49.0 / 176.0,
                        -5103.0 / 18656.0,
                    ],
                    &[
                        35.0 / 384.0,
                        0.0,
                        500.0 / 1113.0,
                        125.0 / 192.0,
                        -2187.0 / 6784.0,
                        11.0 / 84.0,
                    ],
                ],
                &[
                    35.0 / 384.0,
                    0.0,
                    500.0 / 1113.0,
                    125.0 / 192.0,
                    -2187.0 / 6784.0,
                    11.0 / 84.0,
                    0.0,
                ],
                &[
                    5179.0 / 57600.0,
                    0.0,
                    7571.0 / 16695.0,
                    393.0 / 640.0,
                    -92097.0 / 339200.0,
                    187.0 / 2100.0,
                    1.0 / 40.0,
                ],
                &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
            ),
            IntegratorMethod::RungeKuttaFehlberg54 => Self::from_rows(
                6,
                &[
                    &[],
                    &[1.0 / 4.0],
                    &[3.0 / 32.0, 9.0 / 32.0],
                    &[1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0],
                    &[439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0],
                    &[
                        -8.0 / 27.0,
                        2.0,
                        -3544.0 / 2565.0,
                        1859.0 / 4104.0,
                        -11.0 / 40.0,
                    ],
                ],
                &[
                    16.0 / 135.0,
                    0.0,
                    6656.0 / 12825.0,
                    28561.0 / 56430.0,
                    -9.0 / 50.0,
                    2.0 / 55.0,
                ],
                &[
                    25.0 / 216.0,
                    0.0,
                    1408.0 / 2565.0,
                    2197.0 / 4104.0,
                    -1.0 / 5.0,
                    0.0,
                ],
                &[0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0],
            ),
        }
    }

    /// Checks the tableau consistency conditions within `1e-12`.
    ///
    /// A violation here is a fatal invariant, not a runtime saturation
    /// condition, so it is reported as an error.
    pub fn validate(&self, method: IntegratorMethod) -> Result<(), PhysicsError> {
        const TOLERANCE: Scalar = 1e-12;
        for n in 0..self.order {
            let row_sum: Scalar = self.a[n].iter().sum();
            if (row_sum - self.c[n]).abs() > TOLERANCE {
                return Err(PhysicsError::TableauInconsistent {
                    method,
                    detail: "row sum of a does not match node",
                });
            }
        }
        let b_sum: Scalar = self.b.iter().sum();
        if (b_sum - 1.0).abs() > TOLERANCE {
            return Err(PhysicsError::TableauInconsistent {
                method,
                detail: "primary weights do not sum to one",
            });
        }
        let b_hat_sum: Scalar = self.b_hat.iter().sum();
        if (b_hat_sum - 1.0).abs() > TOLERANCE {
            return Err(PhysicsError::TableauInconsistent {
                method,
                detail: "embedded weights do not sum to one",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tableaus_are_consistent() {
        for method in IntegratorMethod::ALL {
            let tableau = ButcherTableau::for_method(method);
            tableau.validate(method).unwrap();
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_rkf54() {
        assert_eq!(
            IntegratorMethod::from_code(200),
            IntegratorMethod::RungeKuttaFehlberg54
        );
        for method in IntegratorMethod::ALL {
            assert_eq!(IntegratorMethod::from_code(method.code()), method);
        }
    }

    #[test]
    fn stage_counts_match_the_pairs() {
        assert_eq!(ButcherTableau::for_method(IntegratorMethod::HeunEuler21).order, 2);
        assert_eq!(
            ButcherTableau::for_method(IntegratorMethod::BogackiShampine32).order,
            4
        );
        assert_eq!(
            ButcherTableau::for_method(IntegratorMethod::DormandPrince54).order,
            7
        );
    }
}
