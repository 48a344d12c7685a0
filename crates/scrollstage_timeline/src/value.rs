// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property values animated by segments.

use serde::{Deserialize, Serialize};

/// Kind of a property value, used for validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Scalar
    Float,
    /// 2D vector
    Vec2,
    /// 3D vector
    Vec3,
    /// RGBA color
    Color,
    /// Boolean flag
    Bool,
    /// Text content
    Text,
}

/// Value of an animated property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Scalar value (opacity, x, rotation, ...)
    Float(f64),
    /// 2D vector
    Vec2([f64; 2]),
    /// 3D vector (position, scale)
    Vec3([f64; 3]),
    /// Color (RGBA)
    Color([f64; 4]),
    /// Boolean (visibility)
    Bool(bool),
    /// Text content (slide titles)
    Text(String),
}

/// Interpolation written as a weighted sum so that t = 0 and t = 1 return
/// the endpoints bit-exactly.
fn mix(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

fn mix_array<const N: usize>(a: &[f64; N], b: &[f64; N], t: f64) -> [f64; N] {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = mix(a[i], b[i], t);
    }
    out
}

impl PropertyValue {
    /// Get the value kind
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Float(_) => ValueKind::Float,
            PropertyValue::Vec2(_) => ValueKind::Vec2,
            PropertyValue::Vec3(_) => ValueKind::Vec3,
            PropertyValue::Color(_) => ValueKind::Color,
            PropertyValue::Bool(_) => ValueKind::Bool,
            PropertyValue::Text(_) => ValueKind::Text,
        }
    }

    /// Whether every numeric component is finite
    pub fn is_finite(&self) -> bool {
        match self {
            PropertyValue::Float(v) => v.is_finite(),
            PropertyValue::Vec2(v) => v.iter().all(|c| c.is_finite()),
            PropertyValue::Vec3(v) => v.iter().all(|c| c.is_finite()),
            PropertyValue::Color(v) => v.iter().all(|c| c.is_finite()),
            PropertyValue::Bool(_) | PropertyValue::Text(_) => true,
        }
    }

    /// Interpolate toward `other` by an eased fraction `t`.
    ///
    /// `t` may leave [0, 1] for overshooting curves. Discrete kinds hold
    /// `self` until `t` reaches 1. Returns `None` on mismatched kinds.
    pub fn interpolate(&self, other: &PropertyValue, t: f64) -> Option<PropertyValue> {
        match (self, other) {
            (PropertyValue::Float(a), PropertyValue::Float(b)) => {
                Some(PropertyValue::Float(mix(*a, *b, t)))
            }
            (PropertyValue::Vec2(a), PropertyValue::Vec2(b)) => {
                Some(PropertyValue::Vec2(mix_array(a, b, t)))
            }
            (PropertyValue::Vec3(a), PropertyValue::Vec3(b)) => {
                Some(PropertyValue::Vec3(mix_array(a, b, t)))
            }
            (PropertyValue::Color(a), PropertyValue::Color(b)) => {
                Some(PropertyValue::Color(mix_array(a, b, t)))
            }
            (PropertyValue::Bool(_), PropertyValue::Bool(_))
            | (PropertyValue::Text(_), PropertyValue::Text(_)) => {
                if t >= 1.0 {
                    Some(other.clone())
                } else {
                    Some(self.clone())
                }
            }
            _ => None,
        }
    }

    /// Get as float if possible
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as Vec3 if possible
    pub fn as_vec3(&self) -> Option<[f64; 3]> {
        match self {
            PropertyValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as color if possible
    pub fn as_color(&self) -> Option<[f64; 4]> {
        match self {
            PropertyValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as text if possible
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}
