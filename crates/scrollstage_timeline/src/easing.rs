// SPDX-License-Identifier: MIT OR Apache-2.0
//! Easing curves.
//!
//! The set is closed: linear, the four power families, sine, expo, back,
//! smoothstep, a single step and CSS-style cubic bezier. Easings serialize as
//! the short names used in timeline declarations (`"power2.out"`,
//! `"back.out(1.7)"`, `"cubic-bezier(0.25,0.1,0.25,1)"`).

use crate::error::TimelineError;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;

/// Default overshoot for back easing
pub const DEFAULT_BACK_OVERSHOOT: f64 = 1.70158;

/// Which end of the curve the acceleration applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EaseMode {
    /// Accelerate from rest
    In,
    /// Decelerate to rest
    #[default]
    Out,
    /// Accelerate then decelerate
    InOut,
}

impl EaseMode {
    fn shape(self, t: f64, ease_in: impl Fn(f64) -> f64) -> f64 {
        match self {
            EaseMode::In => ease_in(t),
            EaseMode::Out => 1.0 - ease_in(1.0 - t),
            EaseMode::InOut => {
                if t < 0.5 {
                    ease_in(2.0 * t) / 2.0
                } else {
                    1.0 - ease_in(2.0 * (1.0 - t)) / 2.0
                }
            }
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            EaseMode::In => "in",
            EaseMode::Out => "out",
            EaseMode::InOut => "inOut",
        }
    }
}

/// An easing curve mapping linear t in [0, 1] to eased t
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Easing {
    /// No easing
    #[default]
    Linear,
    /// Polynomial easing; level 1..=4 maps to exponents 2..=5
    Power {
        /// Power level (1 = quad, 4 = quint)
        level: u8,
        /// Curve mode
        mode: EaseMode,
    },
    /// Sinusoidal easing
    Sine(EaseMode),
    /// Exponential easing
    Expo(EaseMode),
    /// Overshooting easing
    Back {
        /// Overshoot amount
        overshoot: f64,
        /// Curve mode
        mode: EaseMode,
    },
    /// Hermite smoothstep
    Smoothstep,
    /// Jump from start to end when t reaches 1
    Step,
    /// CSS cubic bezier with control points (x1, y1, x2, y2)
    CubicBezier([f64; 4]),
}

impl Easing {
    /// Power easing with the given level and mode
    pub fn power(level: u8, mode: EaseMode) -> Self {
        if level == 0 {
            Easing::Linear
        } else {
            Easing::Power { level: level.min(4), mode }
        }
    }

    /// Evaluate the curve.
    ///
    /// Input is clamped to [0, 1]; the endpoints map exactly to 0 and 1.
    /// Back easing may return values outside [0, 1] in between.
    pub fn apply(&self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if t == 0.0 {
            return 0.0;
        }
        if t == 1.0 {
            return 1.0;
        }

        match *self {
            Easing::Linear => t,
            Easing::Power { level, mode } => {
                let exponent = i32::from(level) + 1;
                mode.shape(t, |x| x.powi(exponent))
            }
            Easing::Sine(mode) => mode.shape(t, |x| 1.0 - (x * FRAC_PI_2).cos()),
            Easing::Expo(mode) => mode.shape(t, |x| {
                if x == 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * (x - 1.0))
                }
            }),
            Easing::Back { overshoot, mode } => {
                mode.shape(t, |x| x * x * ((overshoot + 1.0) * x - overshoot))
            }
            Easing::Smoothstep => t * t * (3.0 - 2.0 * t),
            Easing::Step => 0.0,
            Easing::CubicBezier([x1, y1, x2, y2]) => {
                let u = solve_bezier_x(x1, x2, t);
                bezier(0.0, y1, y2, 1.0, u)
            }
        }
    }
}

/// Cubic bezier with fixed endpoints
fn bezier(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = 1.0 - t;
    let mt2 = mt * mt;
    let mt3 = mt2 * mt;

    p0 * mt3 + 3.0 * p1 * mt2 * t + 3.0 * p2 * mt * t2 + p3 * t3
}

fn bezier_slope(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * p1 + 6.0 * mt * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
}

/// Find the curve parameter whose x equals `x`.
fn solve_bezier_x(x1: f64, x2: f64, x: f64) -> f64 {
    let mut u = x;
    for _ in 0..8 {
        let err = bezier(0.0, x1, x2, 1.0, u) - x;
        if err.abs() < 1e-7 {
            return u;
        }
        let slope = bezier_slope(x1, x2, u);
        if slope.abs() < 1e-6 {
            break;
        }
        u -= err / slope;
    }

    // Newton stalled on a flat spot; fall back to bisection
    let (mut lo, mut hi) = (0.0, 1.0);
    u = x;
    for _ in 0..40 {
        let value = bezier(0.0, x1, x2, 1.0, u);
        if (value - x).abs() < 1e-7 {
            break;
        }
        if value < x {
            lo = u;
        } else {
            hi = u;
        }
        u = (lo + hi) / 2.0;
    }
    u
}

fn parse_mode(mode: Option<&str>, raw: &str) -> Result<EaseMode, TimelineError> {
    match mode {
        None | Some("out") => Ok(EaseMode::Out),
        Some("in") => Ok(EaseMode::In),
        Some("inout") => Ok(EaseMode::InOut),
        Some(_) => Err(TimelineError::UnknownEasing(raw.to_string())),
    }
}

fn parse_args(inner: &str, raw: &str) -> Result<Vec<f64>, TimelineError> {
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| TimelineError::UnknownEasing(raw.to_string()))
        })
        .collect()
}

impl FromStr for Easing {
    type Err = TimelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lower = raw.trim().to_ascii_lowercase();

        match lower.as_str() {
            "none" | "linear" | "power0" | "power0.out" | "power0.in" | "power0.inout" => {
                return Ok(Easing::Linear)
            }
            "smoothstep" => return Ok(Easing::Smoothstep),
            "step" | "steps(1)" => return Ok(Easing::Step),
            "ease" => return Ok(Easing::CubicBezier([0.25, 0.1, 0.25, 1.0])),
            "ease-in" => return Ok(Easing::CubicBezier([0.42, 0.0, 1.0, 1.0])),
            "ease-out" => return Ok(Easing::CubicBezier([0.0, 0.0, 0.58, 1.0])),
            "ease-in-out" => return Ok(Easing::CubicBezier([0.42, 0.0, 0.58, 1.0])),
            _ => {}
        }

        if let Some(inner) = lower
            .strip_prefix("cubic-bezier(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let args = parse_args(inner, raw)?;
            return match args.as_slice() {
                [x1, y1, x2, y2] if (0.0..=1.0).contains(x1) && (0.0..=1.0).contains(x2) => {
                    Ok(Easing::CubicBezier([*x1, *y1, *x2, *y2]))
                }
                _ => Err(TimelineError::UnknownEasing(raw.to_string())),
            };
        }

        let (family, rest) = match lower.split_once('.') {
            Some((family, rest)) => (family, Some(rest)),
            None => (lower.as_str(), None),
        };

        // Parameters ride on the mode: "back.out(1.7)"
        let (mode, param) = match rest.map(|r| r.split_once('(')) {
            Some(Some((mode, param))) => {
                let param = param
                    .strip_suffix(')')
                    .ok_or_else(|| TimelineError::UnknownEasing(raw.to_string()))?;
                (Some(mode), Some(param))
            }
            Some(None) => (rest, None),
            None => (None, None),
        };
        let mode = parse_mode(mode, raw)?;

        match family {
            "power1" | "quad" => Ok(Easing::power(1, mode)),
            "power2" | "cubic" => Ok(Easing::power(2, mode)),
            "power3" | "quart" => Ok(Easing::power(3, mode)),
            "power4" | "quint" | "strong" => Ok(Easing::power(4, mode)),
            "sine" => Ok(Easing::Sine(mode)),
            "expo" => Ok(Easing::Expo(mode)),
            "back" => {
                let overshoot = match param {
                    Some(p) => parse_args(p, raw)?
                        .first()
                        .copied()
                        .ok_or_else(|| TimelineError::UnknownEasing(raw.to_string()))?,
                    None => DEFAULT_BACK_OVERSHOOT,
                };
                Ok(Easing::Back { overshoot, mode })
            }
            _ => Err(TimelineError::UnknownEasing(raw.to_string())),
        }
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Easing::Linear => f.write_str("none"),
            Easing::Power { level, mode } => write!(f, "power{}.{}", level, mode.suffix()),
            Easing::Sine(mode) => write!(f, "sine.{}", mode.suffix()),
            Easing::Expo(mode) => write!(f, "expo.{}", mode.suffix()),
            Easing::Back { overshoot, mode } => {
                write!(f, "back.{}({})", mode.suffix(), overshoot)
            }
            Easing::Smoothstep => f.write_str("smoothstep"),
            Easing::Step => f.write_str("step"),
            Easing::CubicBezier([x1, y1, x2, y2]) => {
                write!(f, "cubic-bezier({x1},{y1},{x2},{y2})")
            }
        }
    }
}

impl TryFrom<String> for Easing {
    type Error = TimelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Easing> for String {
    fn from(value: Easing) -> Self {
        value.to_string()
    }
}
