//! Scalar expressions over the frame time `t`.
//!
//! An [`Expr`] renders to ffmpeg expression syntax via `Display` and can be
//! evaluated in-process with [`Expr::eval`], so the same tree that is handed
//! to the filter is the one tests check.

use std::fmt;

/// A scalar expression of the frame time `t` (seconds).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant.
    Const(f64),

    /// Linear interpolation `a + (b - a) * ((t - t0) / (t1 - t0))`.
    Lerp { t0: f64, t1: f64, a: f64, b: f64 },

    /// `then` when `t < at`, otherwise `otherwise`.
    Before {
        at: f64,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// `then` when `t0 <= t <= t1` (inclusive both ends), otherwise `otherwise`.
    Between {
        t0: f64,
        t1: f64,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    /// Evaluate at frame time `t`.
    pub fn eval(&self, t: f64) -> f64 {
        match self {
            Expr::Const(v) => *v,
            Expr::Lerp { t0, t1, a, b } => a + (b - a) * ((t - t0) / (t1 - t0)),
            Expr::Before {
                at,
                then,
                otherwise,
            } => {
                if t < *at {
                    then.eval(t)
                } else {
                    otherwise.eval(t)
                }
            }
            Expr::Between {
                t0,
                t1,
                then,
                otherwise,
            } => {
                if *t0 <= t && t <= *t1 {
                    then.eval(t)
                } else {
                    otherwise.eval(t)
                }
            }
        }
    }

    /// Number of `between` segments in the conditional chain.
    pub fn segment_count(&self) -> usize {
        match self {
            Expr::Const(_) | Expr::Lerp { .. } => 0,
            Expr::Before {
                then, otherwise, ..
            } => then.segment_count() + otherwise.segment_count(),
            Expr::Between {
                then, otherwise, ..
            } => 1 + then.segment_count() + otherwise.segment_count(),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

/// Shortest round-trip form; negatives are parenthesized so that `t-(-5)`
/// never renders as `t--5`.
struct Num(f64);

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_sign_negative() {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{}", Num(*v)),
            Expr::Lerp { t0, t1, a, b } => write!(
                f,
                "({a}+({b}-{a})*((t-{t0})/({t1}-{t0})))",
                a = Num(*a),
                b = Num(*b),
                t0 = Num(*t0),
                t1 = Num(*t1),
            ),
            Expr::Before {
                at,
                then,
                otherwise,
            } => write!(f, "if(lt(t,{}),{},{})", Num(*at), then, otherwise),
            Expr::Between {
                t0,
                t1,
                then,
                otherwise,
            } => write!(
                f,
                "if(between(t,{},{}),{},{})",
                Num(*t0),
                Num(*t1),
                then,
                otherwise
            ),
        }
    }
}
