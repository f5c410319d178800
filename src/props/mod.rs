//! Remote property model.
//!
//! A property is a named, typed, remotely adjustable value owned by the
//! controller and cached locally.  The kind catalog is fixed, so the
//! value is a tagged union rather than an open trait — codec lookup
//! stays exhaustive and compiler-checked.

pub mod codec;
pub mod sync;

use serde::{Deserialize, Serialize};

/// Scale factor of the Q15 fixed-point encoding (15 fractional bits).
pub const Q15_ONE: i32 = 32768;

/// Encode a float as Q15: nearest 1/32768 step.
pub fn q15_encode(value: f32) -> i32 {
    (value * Q15_ONE as f32).round() as i32
}

/// Decode a Q15 wire integer back to a float.
pub fn q15_decode(wire: i32) -> f32 {
    wire as f32 / Q15_ONE as f32
}

/// Property groups fetched and pushed as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GroupId {
    /// Controller-wide settings.
    Global = 1,
    /// Settings of the currently selected scene.
    Scene = 2,
}

impl GroupId {
    /// Every group, in fetch order.
    pub const ALL: [GroupId; 2] = [GroupId::Global, GroupId::Scene];

    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::Global),
            2 => Some(Self::Scene),
            _ => None,
        }
    }

    /// Dense index for per-group storage.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Global => 0,
            Self::Scene => 1,
        }
    }
}

/// Rendering hint for numeric properties.  The controller distinguishes
/// plain number entry from full-width and compact sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderStyle {
    Number,
    Slider,
    SmallSlider,
}

/// Packed ARGB colour, 4 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argb {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Argb {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { a: 0xFF, r, g, b }
    }

    pub fn pack(self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }

    pub fn unpack(raw: u32) -> Self {
        Self {
            a: (raw >> 24) as u8,
            r: (raw >> 16) as u8,
            g: (raw >> 8) as u8,
            b: raw as u8,
        }
    }
}

/// The value (and, for numeric kinds, bounds) of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Float {
        style: SliderStyle,
        value: f32,
        min: f32,
        max: f32,
    },
    Int {
        style: SliderStyle,
        value: i32,
        min: i32,
        max: i32,
    },
    Color(Argb),
    Enum {
        labels: Vec<String>,
        selected: u16,
    },
    Bool(bool),
    /// Local-only placeholder occupying a group while a fetch is in
    /// flight.  Never crosses the wire.
    Loading { progress: f32 },
}

impl PropertyValue {
    /// Diagnostic label used in decode errors and logs.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Float {
                style: SliderStyle::Number,
                ..
            } => "float-number",
            Self::Float {
                style: SliderStyle::Slider,
                ..
            } => "float-slider",
            Self::Float {
                style: SliderStyle::SmallSlider,
                ..
            } => "float-small-slider",
            Self::Int {
                style: SliderStyle::Number,
                ..
            } => "int-number",
            Self::Int {
                style: SliderStyle::Slider,
                ..
            } => "int-slider",
            Self::Int {
                style: SliderStyle::SmallSlider,
                ..
            } => "int-small-slider",
            Self::Color(_) => "color",
            Self::Enum { .. } => "enum",
            Self::Bool(_) => "bool",
            Self::Loading { .. } => "loading",
        }
    }
}

/// A user-originated edit to a property value.
///
/// Carrying edits in their own type is the origin tag: values arriving
/// from the wire hydrate the cache directly and are never re-pushed,
/// while a `PropertyUpdate` always propagates upstream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyUpdate {
    Float(f32),
    Int(i32),
    Color(Argb),
    EnumSelected(u16),
    Bool(bool),
}

/// A single cached property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Controller-assigned id, stable for the session.
    pub id: i32,
    pub group: GroupId,
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    /// The transient pseudo-property shown while a group fetch is in
    /// flight.
    pub fn loading(group: GroupId, progress: f32) -> Self {
        Self {
            id: -1,
            group,
            name: String::new(),
            value: PropertyValue::Loading { progress },
        }
    }
}
