//! Forward-mode automatic differentiation via the `hyperdual` crate.
//!
//! `hyperdual` binds its derivative count to a compile-time dimension, the
//! same way the `nyx-space` family (`oakwhiz-nyx-space-apache`'s `dual_eom`,
//! `gregjesl-nyx`'s spherical-harmonics dynamics) uses `Hyperdual<f64, U7>`
//! to get a value plus six derivatives out of one evaluation. This crate's
//! model dimensions are runtime quantities, so [`crate::linearize`] takes
//! the same "seed one direction, read off one Jacobian column" approach
//! those modules do, just with the smallest hyperdual that can hold it: a
//! value and a single derivative slot.
use hyperdual::Hyperdual;

/// `value + eps * derivative`, tracking exactly one derivative component.
pub type Dual = Hyperdual<f64, 2>;

/// A constant: zero derivative.
pub fn constant(val: f64) -> Dual {
    Dual::from_real(val)
}

/// The differentiation variable: derivative `1`.
pub fn variable(val: f64) -> Dual {
    Dual::from_fn(|i| if i == 0 { val } else { 1.0 })
}

/// Read off the value component.
pub fn value(d: &Dual) -> f64 {
    d.real()
}

/// Read off the (only) derivative component.
pub fn derivative(d: &Dual) -> f64 {
    d[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hyperdual::Float;

    #[test]
    fn product_rule() {
        let x = variable(3.0);
        let y = x * x; // d/dx x^2 = 2x
        assert_relative_eq!(value(&y), 9.0);
        assert_relative_eq!(derivative(&y), 6.0);
    }

    #[test]
    fn quotient_rule() {
        let x = variable(2.0);
        let y = constant(1.0) / x; // d/dx 1/x = -1/x^2
        assert_relative_eq!(value(&y), 0.5);
        assert_relative_eq!(derivative(&y), -0.25);
    }

    #[test]
    fn trig_derivatives() {
        let x = variable(0.0);
        let s = x.sin();
        assert_relative_eq!(value(&s), 0.0);
        assert_relative_eq!(derivative(&s), 1.0); // d/dx sin(x)|_0 = cos(0) = 1
        let c = x.cos();
        assert_relative_eq!(derivative(&c), 0.0); // d/dx cos(x)|_0 = -sin(0) = 0
    }
}
