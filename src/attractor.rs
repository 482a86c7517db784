// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The attractor is the per-iteration update rule, `z -> f(z, p)`.
//! It is built once, either from an expression or from a closure, and
//! is immutable afterwards.  Clones share the compiled function.

use crate::error::Result;
use crate::expr::{self, Constants};
use num::Complex;
use std::fmt;
use std::sync::Arc;

/// The default rule, the classic quadratic family.
pub const DEFAULT_ATTRACTOR: &str = "z^2 + const";

type Rule = dyn Fn(Complex<f64>, Complex<f64>) -> Complex<f64> + Send + Sync;

/// A pure map from (current value, parameter) to the next value.
#[derive(Clone)]
pub struct Attractor {
    source: String,
    constants: Constants,
    rule: Arc<Rule>,
}

impl Attractor {
    /// Wraps a ready-made function.  The source text reported for it
    /// is `<closure>`.
    pub fn from_fn<F>(f: F) -> Attractor
    where
        F: Fn(Complex<f64>, Complex<f64>) -> Complex<f64> + Send + Sync + 'static,
    {
        Attractor {
            source: "<closure>".to_string(),
            constants: Constants::default(),
            rule: Arc::new(f),
        }
    }

    /// Compiles an expression in `z` (the current value) and `const`
    /// (the parameter).  `a`, `b` and `c` are bound to zero.
    pub fn parse(source: &str) -> Result<Attractor> {
        Attractor::with_constants(source, Constants::default())
    }

    /// Compiles an expression with explicit values for `a`, `b` and
    /// `c`.
    pub fn with_constants(source: &str, constants: Constants) -> Result<Attractor> {
        let compiled = expr::compile(source, constants)?;
        debug!("compiled attractor '{}'", source);
        Ok(Attractor {
            source: source.trim().to_string(),
            constants,
            rule: Arc::from(compiled),
        })
    }

    /// The classic `z^2 + const`, without going through the parser.
    pub fn quadratic() -> Attractor {
        Attractor {
            source: DEFAULT_ATTRACTOR.to_string(),
            constants: Constants::default(),
            rule: Arc::new(|z: Complex<f64>, p: Complex<f64>| z * z + p),
        }
    }

    /// One step of the orbit.
    #[inline]
    pub fn apply(&self, z: Complex<f64>, parameter: Complex<f64>) -> Complex<f64> {
        (self.rule)(z, parameter)
    }

    /// The text this attractor was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The values `a`, `b` and `c` were bound to.  All zero for
    /// closures.
    pub fn constants(&self) -> Constants {
        self.constants
    }
}

impl Default for Attractor {
    fn default() -> Self {
        Attractor::quadratic()
    }
}

impl fmt::Debug for Attractor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Attractor")
            .field("source", &self.source)
            .field("constants", &self.constants)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_and_closure_forms_agree() {
        let parsed = Attractor::parse(DEFAULT_ATTRACTOR).unwrap();
        let closure = Attractor::from_fn(|z, p| z * z + p);
        let p = Complex::new(-0.8, 0.156);
        let mut a = Complex::new(0.1, 0.2);
        let mut b = a;
        for _ in 0..20 {
            a = parsed.apply(a, p);
            b = closure.apply(b, p);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn source_is_reported() {
        assert_eq!(Attractor::parse(" z^3 + const ").unwrap().source(), "z^3 + const");
        assert_eq!(Attractor::from_fn(|z, _| z).source(), "<closure>");
        assert_eq!(Attractor::default().source(), DEFAULT_ATTRACTOR);
    }

    #[test]
    fn constants_are_kept() {
        let constants = Constants {
            a: Complex::new(3.0, 0.0),
            b: Complex::new(0.0, 0.0),
            c: Complex::new(0.5, -1.0),
        };
        let attractor = Attractor::with_constants("a*z^2 + c", constants).unwrap();
        assert_eq!(attractor.constants(), constants);
        assert_eq!(attractor.apply(Complex::new(1.0, 0.0), Complex::new(0.0, 0.0)), Complex::new(3.5, -1.0));
        assert_eq!(Attractor::quadratic().constants(), Constants::default());
    }

    #[test]
    fn bad_expression_is_rejected() {
        assert!(Attractor::parse("z^^2").is_err());
    }
}
