//! Weighted sigmoid variants
//!
//! Scalar kernels applied by the fused evaluator at each stored weight
//! position. With `p = U_i · V_j` and multiplier `w`:
//!
//! | Variant    | Value                    |
//! |------------|--------------------------|
//! | `Basic`    | `w * sigmoid(p)`         |
//! | `Log`      | `w * log(sigmoid(p))`    |
//! | `Minus`    | `w * sigmoid(-p)`        |
//! | `LogMinus` | `w * log(sigmoid(-p))`   |
//!
//! All variants are finite for finite inputs: `exp` is only ever evaluated on
//! non-positive arguments and `log(sigmoid(x))` uses the `log1p` form.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Beyond this magnitude `sigmoid` saturates to exactly 0 or 1
pub const SIGMOID_BOUND: f64 = 700.0;

/// Logistic function `1 / (1 + exp(-x))`
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x > SIGMOID_BOUND {
        1.0
    } else if x < -SIGMOID_BOUND {
        0.0
    } else if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `log(sigmoid(x))` without forming `sigmoid(x)` first
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

/// Which weighted sigmoid function to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SigmoidVariant {
    /// `w * sigmoid(p)`
    #[default]
    Basic,
    /// `w * log(sigmoid(p))`
    Log,
    /// `w * sigmoid(-p)`
    Minus,
    /// `w * log(sigmoid(-p))`
    LogMinus,
}

impl SigmoidVariant {
    /// All variants
    pub const ALL: [SigmoidVariant; 4] = [
        SigmoidVariant::Basic,
        SigmoidVariant::Log,
        SigmoidVariant::Minus,
        SigmoidVariant::LogMinus,
    ];

    /// True for the variants that evaluate at `-p`
    #[inline]
    pub fn negates_input(&self) -> bool {
        matches!(self, SigmoidVariant::Minus | SigmoidVariant::LogMinus)
    }

    /// True for the log variants
    #[inline]
    pub fn is_log(&self) -> bool {
        matches!(self, SigmoidVariant::Log | SigmoidVariant::LogMinus)
    }

    /// Evaluate the variant for dot product `p` and multiplier `w`
    #[inline]
    pub fn apply(&self, p: f64, w: f64) -> f64 {
        let x = if self.negates_input() { -p } else { p };
        if self.is_log() {
            w * log_sigmoid(x)
        } else {
            w * sigmoid(x)
        }
    }

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            SigmoidVariant::Basic => "basic",
            SigmoidVariant::Log => "log",
            SigmoidVariant::Minus => "minus",
            SigmoidVariant::LogMinus => "log_minus",
        }
    }
}

impl fmt::Display for SigmoidVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SigmoidVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(SigmoidVariant::Basic),
            "log" => Ok(SigmoidVariant::Log),
            "minus" => Ok(SigmoidVariant::Minus),
            "log_minus" | "logminus" => Ok(SigmoidVariant::LogMinus),
            _ => Err(Error::invalid_argument(
                "variant",
                format!(
                    "Invalid sigmoid variant '{}'. Valid options: basic, log, minus, log_minus",
                    s
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_reference_values() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(2.0) - 0.8807970779778823).abs() < 1e-15);
        assert!((sigmoid(-2.0) - 0.11920292202211755).abs() < 1e-15);
        // symmetry
        for x in [0.1, 1.0, 5.0, 30.0] {
            assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-15);
        }
    }

    #[test]
    fn test_sigmoid_saturates_without_overflow() {
        assert_eq!(sigmoid(1e6), 1.0);
        assert_eq!(sigmoid(-1e6), 0.0);
        assert_eq!(sigmoid(f64::MAX), 1.0);
        assert_eq!(sigmoid(f64::MIN), 0.0);
        assert!(sigmoid(-700.0) > 0.0);
    }

    #[test]
    fn test_log_sigmoid_is_stable() {
        assert!((log_sigmoid(0.0) - 0.5f64.ln()).abs() < 1e-15);
        // naive log(sigmoid(-800)) would be log(0) = -inf
        assert!((log_sigmoid(-800.0) + 800.0).abs() < 1e-12);
        assert!(log_sigmoid(800.0) <= 0.0 && log_sigmoid(800.0).is_finite());
        for x in [-30.0, -3.0, -0.5, 0.5, 3.0, 30.0] {
            assert!((log_sigmoid(x) - sigmoid(x).ln()).abs() < 1e-12, "x = {}", x);
        }
    }

    #[test]
    fn test_variant_wiring() {
        let p = 1.25;
        let w = 3.0;
        assert_eq!(SigmoidVariant::Basic.apply(p, w), w * sigmoid(p));
        assert_eq!(SigmoidVariant::Log.apply(p, w), w * log_sigmoid(p));
        assert_eq!(SigmoidVariant::Minus.apply(p, w), w * sigmoid(-p));
        assert_eq!(SigmoidVariant::LogMinus.apply(p, w), w * log_sigmoid(-p));
    }

    #[test]
    fn test_variant_parse() {
        for variant in SigmoidVariant::ALL {
            assert_eq!(variant.to_string().parse::<SigmoidVariant>().unwrap(), variant);
        }
        assert_eq!("LOGMINUS".parse::<SigmoidVariant>().unwrap(), SigmoidVariant::LogMinus);
        assert!("tanh".parse::<SigmoidVariant>().is_err());
    }
}
