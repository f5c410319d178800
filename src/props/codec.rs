//! Typed binary codec for property descriptors and values.
//!
//! Wire layout (little-endian):
//!
//! ```text
//! descriptor  [id:i32][kind:u8][groupId:u8][name: NUL-terminated UTF-8]
//!             + float kinds: [min:Q15 i32][max:Q15 i32]
//!             + int kinds:   [min:i32][max:i32]
//!             + enum kind:   [count:u16][label\0 × count]
//!             (color and bool carry no extra fields)
//!
//! value       float → Q15 i32 · int → i32 · color → packed ARGB u32
//!             enum → selected u16 · bool → u8
//! ```
//!
//! Floats travel as Q15 fixed point to keep the wire unambiguous; the
//! quantization error is at most 1/32768.  An enum's selected index is
//! clamped to `[0, count-1]` on decode — out-of-range values from a
//! corrupted peer degrade to the last enumerator instead of failing the
//! whole fetch.

use crate::error::{Error, Result};
use crate::wire::bytes::{ByteReader, ByteWriter};

use super::{Argb, GroupId, Property, PropertyValue, SliderStyle, q15_decode, q15_encode};

// Kind tags on the wire.
const KIND_FLOAT_NUMBER: u8 = 0;
const KIND_FLOAT_SLIDER: u8 = 1;
const KIND_FLOAT_SMALL_SLIDER: u8 = 2;
const KIND_INT_NUMBER: u8 = 3;
const KIND_INT_SLIDER: u8 = 4;
const KIND_INT_SMALL_SLIDER: u8 = 5;
const KIND_COLOR: u8 = 6;
const KIND_ENUM: u8 = 7;
const KIND_BOOL: u8 = 8;

/// Wire tag for a value, `None` for the local-only loading placeholder.
pub fn wire_kind(value: &PropertyValue) -> Option<u8> {
    match value {
        PropertyValue::Float { style, .. } => Some(match style {
            SliderStyle::Number => KIND_FLOAT_NUMBER,
            SliderStyle::Slider => KIND_FLOAT_SLIDER,
            SliderStyle::SmallSlider => KIND_FLOAT_SMALL_SLIDER,
        }),
        PropertyValue::Int { style, .. } => Some(match style {
            SliderStyle::Number => KIND_INT_NUMBER,
            SliderStyle::Slider => KIND_INT_SLIDER,
            SliderStyle::SmallSlider => KIND_INT_SMALL_SLIDER,
        }),
        PropertyValue::Color(_) => Some(KIND_COLOR),
        PropertyValue::Enum { .. } => Some(KIND_ENUM),
        PropertyValue::Bool(_) => Some(KIND_BOOL),
        PropertyValue::Loading { .. } => None,
    }
}

fn short(property: &str, kind: &'static str) -> Error {
    Error::Decode {
        property: property.to_owned(),
        kind,
    }
}

/// Decode one property descriptor, leaving the reader positioned after
/// its kind-specific fields.  The initial value is the kind's neutral
/// default (numeric minimum, black, first enumerator, false) until a
/// value decode hydrates it.
pub fn decode_descriptor(r: &mut ByteReader<'_>) -> Result<Property> {
    let id = r.read_i32().ok_or_else(|| short("", "descriptor-id"))?;
    let kind_raw = r.read_u8().ok_or_else(|| short("", "descriptor-kind"))?;
    let group_raw = r.read_u8().ok_or_else(|| short("", "descriptor-group"))?;
    let name = r.read_cstr().ok_or_else(|| short("", "descriptor-name"))?;

    let group = GroupId::from_wire(group_raw).ok_or_else(|| short(&name, "descriptor-group"))?;

    let value = match kind_raw {
        KIND_FLOAT_NUMBER | KIND_FLOAT_SLIDER | KIND_FLOAT_SMALL_SLIDER => {
            let min = r.read_i32().ok_or_else(|| short(&name, "float-bounds"))?;
            let max = r.read_i32().ok_or_else(|| short(&name, "float-bounds"))?;
            let style = match kind_raw {
                KIND_FLOAT_NUMBER => SliderStyle::Number,
                KIND_FLOAT_SLIDER => SliderStyle::Slider,
                _ => SliderStyle::SmallSlider,
            };
            let min = q15_decode(min);
            PropertyValue::Float {
                style,
                value: min,
                min,
                max: q15_decode(max),
            }
        }
        KIND_INT_NUMBER | KIND_INT_SLIDER | KIND_INT_SMALL_SLIDER => {
            let min = r.read_i32().ok_or_else(|| short(&name, "int-bounds"))?;
            let max = r.read_i32().ok_or_else(|| short(&name, "int-bounds"))?;
            let style = match kind_raw {
                KIND_INT_NUMBER => SliderStyle::Number,
                KIND_INT_SLIDER => SliderStyle::Slider,
                _ => SliderStyle::SmallSlider,
            };
            PropertyValue::Int {
                style,
                value: min,
                min,
                max,
            }
        }
        KIND_COLOR => PropertyValue::Color(Argb::opaque(0, 0, 0)),
        KIND_ENUM => {
            let count = r.read_u16().ok_or_else(|| short(&name, "enum-count"))?;
            let mut labels = Vec::with_capacity(usize::from(count));
            for _ in 0..count {
                labels.push(r.read_cstr().ok_or_else(|| short(&name, "enum-label"))?);
            }
            PropertyValue::Enum {
                labels,
                selected: 0,
            }
        }
        KIND_BOOL => PropertyValue::Bool(false),
        other => return Err(Error::UnsupportedKind(other)),
    };

    Ok(Property {
        id,
        group,
        name,
        value,
    })
}

/// Decode a wire value into an already-described property.
pub fn decode_value(r: &mut ByteReader<'_>, property: &mut Property) -> Result<()> {
    let name = property.name.clone();
    match &mut property.value {
        PropertyValue::Float { value, .. } => {
            let wire = r.read_i32().ok_or_else(|| short(&name, "float-value"))?;
            *value = q15_decode(wire);
        }
        PropertyValue::Int { value, .. } => {
            *value = r.read_i32().ok_or_else(|| short(&name, "int-value"))?;
        }
        PropertyValue::Color(color) => {
            let raw = r.read_u32().ok_or_else(|| short(&name, "color-value"))?;
            *color = Argb::unpack(raw);
        }
        PropertyValue::Enum { labels, selected } => {
            let raw = r.read_u16().ok_or_else(|| short(&name, "enum-value"))?;
            // Clamp rather than reject: a corrupted index degrades to the
            // last enumerator.
            *selected = if labels.is_empty() {
                0
            } else {
                raw.min(labels.len() as u16 - 1)
            };
        }
        PropertyValue::Bool(value) => {
            *value = r.read_u8().ok_or_else(|| short(&name, "bool-value"))? != 0;
        }
        PropertyValue::Loading { .. } => {
            return Err(short(&name, "loading"));
        }
    }
    Ok(())
}

/// Encode a property's current value for `SetPropertyValueById`.
pub fn encode_value(property: &Property, w: &mut ByteWriter) -> Result<()> {
    match &property.value {
        PropertyValue::Float { value, .. } => w.put_i32(q15_encode(*value)),
        PropertyValue::Int { value, .. } => w.put_i32(*value),
        PropertyValue::Color(color) => w.put_u32(color.pack()),
        PropertyValue::Enum { selected, .. } => w.put_u16(*selected),
        PropertyValue::Bool(value) => w.put_u8(u8::from(*value)),
        PropertyValue::Loading { .. } => {
            return Err(Error::InvalidValue("loading placeholder is not writable"));
        }
    }
    Ok(())
}

/// Encode a descriptor.  The controller side of the protocol emits
/// these; the client uses it for simulated peers and tests.
pub fn encode_descriptor(property: &Property, w: &mut ByteWriter) -> Result<()> {
    let kind = wire_kind(&property.value)
        .ok_or(Error::InvalidValue("loading placeholder has no descriptor"))?;
    w.put_i32(property.id);
    w.put_u8(kind);
    w.put_u8(property.group as u8);
    w.put_cstr(&property.name);
    match &property.value {
        PropertyValue::Float { min, max, .. } => {
            w.put_i32(q15_encode(*min));
            w.put_i32(q15_encode(*max));
        }
        PropertyValue::Int { min, max, .. } => {
            w.put_i32(*min);
            w.put_i32(*max);
        }
        PropertyValue::Enum { labels, .. } => {
            w.put_u16(labels.len() as u16);
            for label in labels {
                w.put_cstr(label);
            }
        }
        PropertyValue::Color(_) | PropertyValue::Bool(_) => {}
        PropertyValue::Loading { .. } => unreachable!("rejected above"),
    }
    Ok(())
}
