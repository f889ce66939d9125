//! The host helpers visible to scripts.
//!
//! This is the whole capability surface of a strategy: pure math helpers and
//! a seeded random source. Nothing here touches the filesystem, the clock, or
//! any state outside the calling script.

use std::collections::BTreeMap;
use std::f64::consts::{E, PI};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::value::Value;

/// A native function callable from scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Builtin {
    Clamp,
    NormalizeAngle,
    IsFinite,
    IsNaN,
    Abs,
    Sign,
    Min,
    Max,
    Floor,
    Ceil,
    Round,
    Sqrt,
    Pow,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Hypot,
    Random,
}

/// `Math` members backed by a native function, in the order they are installed.
const MATH_FUNCTIONS: &[(&str, Builtin)] = &[
    ("abs", Builtin::Abs),
    ("sign", Builtin::Sign),
    ("min", Builtin::Min),
    ("max", Builtin::Max),
    ("floor", Builtin::Floor),
    ("ceil", Builtin::Ceil),
    ("round", Builtin::Round),
    ("sqrt", Builtin::Sqrt),
    ("pow", Builtin::Pow),
    ("exp", Builtin::Exp),
    ("log", Builtin::Log),
    ("sin", Builtin::Sin),
    ("cos", Builtin::Cos),
    ("tan", Builtin::Tan),
    ("asin", Builtin::Asin),
    ("acos", Builtin::Acos),
    ("atan", Builtin::Atan),
    ("atan2", Builtin::Atan2),
    ("hypot", Builtin::Hypot),
    ("random", Builtin::Random),
];

impl Builtin {
    /// Name as seen from scripts.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Clamp => "clamp",
            Self::NormalizeAngle => "normalizeAngle",
            Self::IsFinite => "isFinite",
            Self::IsNaN => "isNaN",
            other => MATH_FUNCTIONS
                .iter()
                .find(|(_, b)| *b == other)
                .map_or("native", |(name, _)| name),
        }
    }

    /// Invokes the helper. Missing arguments read as `undefined`, which
    /// coerces to `NaN` exactly as it would in a browser.
    pub(crate) fn call(self, args: &[Value], rng: &mut ChaCha8Rng) -> Value {
        let arg = |i: usize| args.get(i).map_or(f64::NAN, Value::to_number);
        let n = match self {
            Self::Clamp => clamp(arg(0), arg(1), arg(2)),
            Self::NormalizeAngle => normalize_angle(arg(0)),
            Self::IsFinite => return Value::Bool(arg(0).is_finite()),
            Self::IsNaN => return Value::Bool(arg(0).is_nan()),
            Self::Abs => arg(0).abs(),
            Self::Sign => {
                let x = arg(0);
                if x.is_nan() || x == 0.0 {
                    x
                } else {
                    x.signum()
                }
            }
            Self::Min => args
                .iter()
                .map(Value::to_number)
                .fold(f64::INFINITY, |acc, x| if x.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(x) }),
            Self::Max => args
                .iter()
                .map(Value::to_number)
                .fold(f64::NEG_INFINITY, |acc, x| if x.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(x) }),
            Self::Floor => arg(0).floor(),
            Self::Ceil => arg(0).ceil(),
            Self::Round => (arg(0) + 0.5).floor(),
            Self::Sqrt => arg(0).sqrt(),
            Self::Pow => arg(0).powf(arg(1)),
            Self::Exp => arg(0).exp(),
            Self::Log => arg(0).ln(),
            Self::Sin => arg(0).sin(),
            Self::Cos => arg(0).cos(),
            Self::Tan => arg(0).tan(),
            Self::Asin => arg(0).asin(),
            Self::Acos => arg(0).acos(),
            Self::Atan => arg(0).atan(),
            Self::Atan2 => arg(0).atan2(arg(1)),
            Self::Hypot => args
                .iter()
                .map(Value::to_number)
                .map(|x| x * x)
                .sum::<f64>()
                .sqrt(),
            Self::Random => rng.gen::<f64>(),
        };
        Value::Number(n)
    }
}

/// `clamp(v, lo, hi)`. `NaN` stays `NaN`.
#[must_use]
pub fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() {
        v
    } else {
        v.max(lo).min(hi)
    }
}

/// Wraps an angle in degrees into (-180, 180].
#[must_use]
pub fn normalize_angle(deg: f64) -> f64 {
    if !deg.is_finite() {
        return f64::NAN;
    }
    let mut a = deg % 360.0;
    if a > 180.0 {
        a -= 360.0;
    } else if a <= -180.0 {
        a += 360.0;
    }
    a
}

/// Global bindings every script starts with.
pub(crate) fn globals() -> Vec<(&'static str, Value)> {
    let mut math = BTreeMap::new();
    for (name, builtin) in MATH_FUNCTIONS {
        math.insert((*name).to_string(), Value::Native(*builtin));
    }
    math.insert("PI".to_string(), Value::Number(PI));
    math.insert("E".to_string(), Value::Number(E));

    vec![
        ("clamp", Value::Native(Builtin::Clamp)),
        ("normalizeAngle", Value::Native(Builtin::NormalizeAngle)),
        ("isFinite", Value::Native(Builtin::IsFinite)),
        ("isNaN", Value::Native(Builtin::IsNaN)),
        ("Math", Value::object_from(math)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("NaN", Value::Number(f64::NAN)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn call(builtin: Builtin, args: &[f64]) -> f64 {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let args: Vec<Value> = args.iter().map(|&x| Value::Number(x)).collect();
        builtin.call(&args, &mut rng).to_number()
    }

    #[test]
    fn normalize_angle_range() {
        assert_eq!(normalize_angle(190.0), -170.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(720.0), 0.0);
        assert_eq!(normalize_angle(-540.0), 180.0);
        assert!(normalize_angle(f64::INFINITY).is_nan());
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(5.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.25, -1.0, 1.0), 0.25);
        assert!(clamp(f64::NAN, -1.0, 1.0).is_nan());
    }

    #[test]
    fn math_helpers() {
        assert_eq!(call(Builtin::Round, &[2.5]), 3.0);
        assert_eq!(call(Builtin::Round, &[-2.5]), -2.0);
        assert_eq!(call(Builtin::Min, &[3.0, 1.0, 2.0]), 1.0);
        assert_eq!(call(Builtin::Max, &[]), f64::NEG_INFINITY);
        assert!(call(Builtin::Max, &[1.0, f64::NAN]).is_nan());
        assert_eq!(call(Builtin::Hypot, &[3.0, 4.0]), 5.0);
        assert_eq!(call(Builtin::Sign, &[-7.0]), -1.0);
        assert!(call(Builtin::Sqrt, &[]).is_nan());
    }

    #[test]
    fn random_is_seeded() {
        let mut a = ChaCha8Rng::seed_from_u64(9);
        let mut b = ChaCha8Rng::seed_from_u64(9);
        let x = Builtin::Random.call(&[], &mut a).to_number();
        let y = Builtin::Random.call(&[], &mut b).to_number();
        assert_eq!(x, y);
        assert!((0.0..1.0).contains(&x));
    }

    #[test]
    fn names_match_script_spelling() {
        assert_eq!(Builtin::Atan2.name(), "atan2");
        assert_eq!(Builtin::NormalizeAngle.name(), "normalizeAngle");
    }
}
