use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A four-character code: tag group, engine marker, or block header name.
///
/// Always held in logical order; byte reversal for little-endian files
/// happens in the cursor.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const NONE: FourCC = FourCC([0xFF; 4]);

    pub fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// Build from a string, padding short codes with spaces.
    pub fn from_str_padded(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 || !s.is_ascii() {
            return None;
        }
        let mut code = [b' '; 4];
        code[..bytes.len()].copy_from_slice(bytes);
        Some(Self(code))
    }

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Lossless text form: one char per byte.
    pub fn to_latin1(self) -> String {
        self.0.iter().map(|&b| b as char).collect()
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_latin1())
    }
}

impl std::fmt::Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.to_latin1())
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_latin1())
    }
}

impl<'de> Deserialize<'de> for FourCC {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        let bytes: Vec<u8> = s.chars().map(|c| c as u32 as u8).collect();
        let code: [u8; 4] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected four characters, got {s:?}")))?;
        Ok(FourCC(code))
    }
}
