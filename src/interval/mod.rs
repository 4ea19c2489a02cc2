/*!
Closed intervals of IEEE-754 doubles, with outward-rounded arithmetic.

An [Interval] is a pair of endpoints, either of which may be infinite, and both of which may coincide (a degenerate point).
The empty interval is its own value, produced whenever an operation has no result.

# Rounding

Every arithmetic operation rounds *outward*: the lower endpoint down, the upper endpoint up.
For the hardware operations a single step to the adjacent double bounds the rounding error; for the transcendental functions, whose library implementations are good to an ulp or so, two steps are taken.
The consequence is the containment guarantee the rest of the library rests on: the interval image of an operation contains every pointwise result.

Nothing here is a general interval library --- the operations are exactly those the [contractors](crate::contractor) and [evaluators](crate::evaluator) need.
*/

pub mod boxes;

use std::f64::consts::{FRAC_PI_2, PI};

/// Rounds a computed lower endpoint down by one step.
fn down(x: f64) -> f64 {
    x.next_down()
}

/// Rounds a computed upper endpoint up by one step.
fn up(x: f64) -> f64 {
    x.next_up()
}

/// As [down], with the extra step library functions need.
fn down_t(x: f64) -> f64 {
    x.next_down().next_down()
}

/// As [up], with the extra step library functions need.
fn up_t(x: f64) -> f64 {
    x.next_up().next_up()
}

/// A product which treats 0 × ±∞ as 0, the convention for interval endpoints.
fn endpoint_mul(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

/// A closed interval of doubles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    lo: f64,
    hi: f64,
}

impl Interval {
    /// The empty interval.
    pub const EMPTY: Interval = Interval {
        lo: f64::INFINITY,
        hi: f64::NEG_INFINITY,
    };

    /// The whole real line.
    pub const ENTIRE: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    /// The interval [lo, hi], or the empty interval if the endpoints do not order.
    pub fn new(lo: f64, hi: f64) -> Self {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            Self::EMPTY
        } else {
            Interval { lo, hi }
        }
    }

    /// The degenerate interval [value, value].
    pub fn point(value: f64) -> Self {
        Self::new(value, value)
    }

    pub fn lo(&self) -> f64 {
        self.lo
    }

    pub fn hi(&self) -> f64 {
        self.hi
    }

    pub fn is_empty(&self) -> bool {
        !(self.lo <= self.hi)
    }

    pub fn is_degenerate(&self) -> bool {
        self.lo == self.hi
    }

    /// The diameter of the interval: 0 for points and the empty interval, ∞ when unbounded.
    pub fn diam(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.hi - self.lo
        }
    }

    /// A representable midpoint.
    ///
    /// Unbounded intervals use the largest finite double as a stand-in, so bisection of an unbounded component peels the unbounded part off.
    pub fn mid(&self) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        match (self.lo == f64::NEG_INFINITY, self.hi == f64::INFINITY) {
            (true, true) => 0.0,
            (true, false) => f64::MIN.min(self.hi),
            (false, true) => f64::MAX.max(self.lo),
            (false, false) => {
                let m = 0.5 * self.lo + 0.5 * self.hi;
                m.clamp(self.lo, self.hi)
            }
        }
    }

    /// True iff the midpoint is representable and distinct from both endpoints.
    pub fn is_bisectable(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let m = self.mid();
        self.lo < m && m < self.hi
    }

    /// Splits the interval at its midpoint.
    ///
    /// The union of the halves is the interval; their intersection is the midpoint alone.
    pub fn bisect(&self) -> Option<(Interval, Interval)> {
        if !self.is_bisectable() {
            return None;
        }
        let m = self.mid();
        Some((Interval::new(self.lo, m), Interval::new(m, self.hi)))
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lo <= value && value <= self.hi
    }

    pub fn is_subset_of(&self, other: &Interval) -> bool {
        self.is_empty() || (other.lo <= self.lo && self.hi <= other.hi)
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        Interval::new(self.lo.max(other.lo), self.hi.min(other.hi))
    }

    /// The smallest interval containing both arguments.
    pub fn hull(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Interval::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    /// Widens both endpoints by `amount`.
    pub fn inflate(&self, amount: f64) -> Interval {
        if self.is_empty() {
            return *self;
        }
        Interval::new(self.lo - amount, self.hi + amount)
    }

    pub fn neg(&self) -> Interval {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Interval {
            lo: -self.hi,
            hi: -self.lo,
        }
    }

    pub fn add(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        let lo = self.lo + other.lo;
        let hi = self.hi + other.hi;
        Interval {
            lo: if lo.is_nan() { f64::NEG_INFINITY } else { down(lo) },
            hi: if hi.is_nan() { f64::INFINITY } else { up(hi) },
        }
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        let candidates = [
            endpoint_mul(self.lo, other.lo),
            endpoint_mul(self.lo, other.hi),
            endpoint_mul(self.hi, other.lo),
            endpoint_mul(self.hi, other.hi),
        ];
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for c in candidates {
            lo = lo.min(c);
            hi = hi.max(c);
        }
        Interval::new(down(lo), up(hi))
    }

    /// Interval division.
    ///
    /// When the divisor straddles zero no finite bound is available and the whole line is returned; the one sharper case is a divisor which *is* zero, where the quotient is empty unless the dividend also meets zero.
    pub fn div(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        if other.contains(0.0) {
            if other.is_degenerate() {
                return if self.contains(0.0) {
                    Self::ENTIRE
                } else {
                    Self::EMPTY
                };
            }
            return Self::ENTIRE;
        }
        let candidates = [
            self.lo / other.lo,
            self.lo / other.hi,
            self.hi / other.lo,
            self.hi / other.hi,
        ];
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for c in candidates {
            if c.is_nan() {
                // ±∞ / ±∞, resolve to the sign-appropriate extreme.
                return Self::ENTIRE;
            }
            lo = lo.min(c);
            hi = hi.max(c);
        }
        Interval::new(down(lo), up(hi))
    }

    pub fn abs(&self) -> Interval {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if self.lo >= 0.0 {
            *self
        } else if self.hi <= 0.0 {
            self.neg()
        } else {
            Interval::new(0.0, (-self.lo).max(self.hi))
        }
    }

    pub fn min(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        Interval::new(self.lo.min(other.lo), self.hi.min(other.hi))
    }

    pub fn max(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        Interval::new(self.lo.max(other.lo), self.hi.max(other.hi))
    }

    /// An integral power.
    pub fn powi(&self, exponent: i32) -> Interval {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if exponent == 0 {
            return Interval::point(1.0);
        }
        if exponent < 0 {
            return Interval::point(1.0).div(&self.powi(-exponent));
        }
        if exponent % 2 == 0 {
            let magnitude = self.abs();
            Interval::new(
                down_t(magnitude.lo.powi(exponent)).max(0.0),
                up_t(magnitude.hi.powi(exponent)),
            )
        } else {
            Interval::new(down_t(self.lo.powi(exponent)), up_t(self.hi.powi(exponent)))
        }
    }

    /// The signed n-th root, the inverse of [powi](Interval::powi) on odd exponents; on even exponents the non-negative root.
    pub fn rootn(&self, n: i32) -> Interval {
        if self.is_empty() || n <= 0 {
            return Self::EMPTY;
        }
        let root = |v: f64| -> f64 {
            if v < 0.0 {
                -(-v).powf(1.0 / n as f64)
            } else {
                v.powf(1.0 / n as f64)
            }
        };
        if n % 2 == 0 {
            let domain = self.intersect(&Interval::new(0.0, f64::INFINITY));
            if domain.is_empty() {
                return Self::EMPTY;
            }
            Interval::new(down_t(root(domain.lo)).max(0.0), up_t(root(domain.hi)))
        } else {
            Interval::new(down_t(root(self.lo)), up_t(root(self.hi)))
        }
    }

    pub fn sqrt(&self) -> Interval {
        let domain = self.intersect(&Interval::new(0.0, f64::INFINITY));
        if domain.is_empty() {
            return Self::EMPTY;
        }
        Interval::new(down_t(domain.lo.sqrt()).max(0.0), up_t(domain.hi.sqrt()))
    }

    /// Squaring, the inverse direction of [sqrt](Interval::sqrt).
    pub fn sqr(&self) -> Interval {
        self.powi(2)
    }

    pub fn exp(&self) -> Interval {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Interval::new(down_t(self.lo.exp()).max(0.0), up_t(self.hi.exp()))
    }

    pub fn log(&self) -> Interval {
        let domain = self.intersect(&Interval::new(0.0, f64::INFINITY));
        if domain.is_empty() || domain.hi == 0.0 {
            return Self::EMPTY;
        }
        let lo = if domain.lo == 0.0 {
            f64::NEG_INFINITY
        } else {
            down_t(domain.lo.ln())
        };
        Interval::new(lo, up_t(domain.hi.ln()))
    }

    /// True when some point `offset + k·period` (k integral) may fall within the interval.
    ///
    /// The test widens the interval slightly, so a *maybe* is answered yes --- which only ever loosens an enclosure.
    fn meets_periodic(&self, offset: f64, period: f64) -> bool {
        if self.is_empty() {
            return false;
        }
        if self.diam() >= period {
            return true;
        }
        let slack = 1e-9 * (1.0 + self.lo.abs().max(self.hi.abs()));
        let k = ((self.lo - slack - offset) / period).ceil();
        offset + k * period <= self.hi + slack
    }

    pub fn sin(&self) -> Interval {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if !self.lo.is_finite() || !self.hi.is_finite() {
            return Interval::new(-1.0, 1.0);
        }
        let hi = if self.meets_periodic(FRAC_PI_2, 2.0 * PI) {
            1.0
        } else {
            up_t(self.lo.sin().max(self.hi.sin())).min(1.0)
        };
        let lo = if self.meets_periodic(-FRAC_PI_2, 2.0 * PI) {
            -1.0
        } else {
            down_t(self.lo.sin().min(self.hi.sin())).max(-1.0)
        };
        Interval::new(lo, hi)
    }

    pub fn cos(&self) -> Interval {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if !self.lo.is_finite() || !self.hi.is_finite() {
            return Interval::new(-1.0, 1.0);
        }
        let hi = if self.meets_periodic(0.0, 2.0 * PI) {
            1.0
        } else {
            up_t(self.lo.cos().max(self.hi.cos())).min(1.0)
        };
        let lo = if self.meets_periodic(PI, 2.0 * PI) {
            -1.0
        } else {
            down_t(self.lo.cos().min(self.hi.cos())).max(-1.0)
        };
        Interval::new(lo, hi)
    }

    pub fn tan(&self) -> Interval {
        if self.is_empty() {
            return Self::EMPTY;
        }
        if !self.lo.is_finite() || !self.hi.is_finite() || self.meets_periodic(FRAC_PI_2, PI) {
            return Self::ENTIRE;
        }
        Interval::new(down_t(self.lo.tan()), up_t(self.hi.tan()))
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "∅")
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}
