//! Animation-curve functions.
//!
//! Older layouts keep a function as an opaque data blob,
//! `[type:u8][flags:u8][pad:2][f32 LE × n]`, where `n` is the type's base
//! value count, doubled when the `ranged` flag is set. Current layouts store
//! the same information as a struct `{type, flags, pad, values: block {value}}`.

use tracing::debug;

use crate::value::{Block, Struct, Value};

/// Flag bit: the function carries a second (upper) curve.
pub const RANGED: u8 = 0x01;

/// Flag names by bit position, as the schemas declare them.
pub const FLAG_NAMES: [&str; 1] = ["ranged"];

const LEGACY_HEADER_SIZE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FunctionKind {
    #[default]
    Identity,
    Constant,
    Transition,
    Periodic,
    Linear,
    LinearKey,
    MultiLinearKey,
    Spline,
    MultiSpline,
    Exponent,
    Spline2,
}

impl FunctionKind {
    pub const ALL: [FunctionKind; 11] = [
        FunctionKind::Identity,
        FunctionKind::Constant,
        FunctionKind::Transition,
        FunctionKind::Periodic,
        FunctionKind::Linear,
        FunctionKind::LinearKey,
        FunctionKind::MultiLinearKey,
        FunctionKind::Spline,
        FunctionKind::MultiSpline,
        FunctionKind::Exponent,
        FunctionKind::Spline2,
    ];

    pub fn from_raw(raw: u8) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub fn raw(self) -> u8 {
        self as u8
    }

    /// Symbol used by the `type` enum in the schemas.
    pub fn name(self) -> &'static str {
        match self {
            FunctionKind::Identity => "identity",
            FunctionKind::Constant => "constant",
            FunctionKind::Transition => "transition",
            FunctionKind::Periodic => "periodic",
            FunctionKind::Linear => "linear",
            FunctionKind::LinearKey => "linear_key",
            FunctionKind::MultiLinearKey => "multi_linear_key",
            FunctionKind::Spline => "spline",
            FunctionKind::MultiSpline => "multi_spline",
            FunctionKind::Exponent => "exponent",
            FunctionKind::Spline2 => "spline2",
        }
    }

    /// Payload values for an unranged function of this kind.
    pub fn base_count(self) -> usize {
        match self {
            FunctionKind::Identity => 0,
            FunctionKind::Constant => 1,
            FunctionKind::Transition => 3,
            FunctionKind::Periodic => 4,
            FunctionKind::Linear => 2,
            FunctionKind::LinearKey => 4,
            FunctionKind::MultiLinearKey => 8,
            FunctionKind::Spline => 4,
            FunctionKind::MultiSpline => 8,
            FunctionKind::Exponent => 3,
            FunctionKind::Spline2 => 4,
        }
    }

    pub fn value_count(self, flags: u8) -> usize {
        if flags & RANGED != 0 {
            self.base_count() * 2
        } else {
            self.base_count()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub kind: FunctionKind,
    pub flags: u8,
    pub values: Vec<f32>,
}

impl Function {
    /// Decode the old blob form. Unknown types become identity and missing
    /// payload values are zero.
    pub fn from_legacy_bytes(bytes: &[u8]) -> Self {
        let raw = bytes.first().copied().unwrap_or(0);
        let flags = bytes.get(1).copied().unwrap_or(0);
        let kind = FunctionKind::from_raw(raw).unwrap_or_else(|| {
            debug!(raw, "unknown function type; using identity");
            FunctionKind::Identity
        });
        let payload = bytes.get(LEGACY_HEADER_SIZE..).unwrap_or(&[]);
        let values = payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .chain(std::iter::repeat(0.0))
            .take(kind.value_count(flags))
            .collect();
        Self {
            kind,
            flags,
            values,
        }
    }

    pub fn to_legacy_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.kind.raw(), self.flags, 0, 0];
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// The structured form stored by current layouts.
    pub fn to_value(&self) -> Value {
        let set = FLAG_NAMES
            .iter()
            .enumerate()
            .filter(|(bit, _)| self.flags & (1 << bit) != 0)
            .map(|(_, name)| name.to_string())
            .collect();
        let values = self
            .values
            .iter()
            .map(|v| Struct::new().with("value", Value::Real(*v)))
            .collect();
        Value::Struct(
            Struct::new()
                .with(
                    "type",
                    Value::Enum {
                        raw: self.kind.raw() as i64,
                        symbol: Some(self.kind.name().to_string()),
                    },
                )
                .with(
                    "flags",
                    Value::Flags {
                        raw: self.flags as u64,
                        set,
                    },
                )
                .with("pad", Value::Pad(vec![0; 2]))
                .with("values", Value::Block(Block::new(values))),
        )
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let s = value.as_struct()?;
        let raw = s.get("type")?.as_i64()?;
        let kind = u8::try_from(raw).ok().and_then(FunctionKind::from_raw)?;
        let flags = s.get("flags").and_then(Value::as_i64).unwrap_or(0) as u8;
        let values = s
            .block("values")
            .map(|b| {
                b.elements
                    .iter()
                    .map(|e| e.get("value").and_then(Value::as_f32).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            kind,
            flags,
            values,
        })
    }
}

/// Replace the old blob in `element.name` with the structured form.
///
/// Already-structured functions are left alone; a missing field gets an
/// identity function.
pub(super) fn upgrade_field(element: &mut Struct, name: &str) -> bool {
    let function = match element.get(name) {
        Some(Value::Struct(_)) => return false,
        Some(Value::Data(data)) => Function::from_legacy_bytes(&data.bytes),
        _ => Function::default(),
    };
    element.set(name, function.to_value());
    true
}
