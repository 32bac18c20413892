use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Byte order of a tag file or of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    Big,
    Little,
}

/// Engine generation, identified by the 4-byte marker at the end of the tag header.
///
/// Known markers:
/// - `blam`: legacy family, big-endian, no block headers on disk
/// - `ambl`: second family, first generation, 12-byte block headers
/// - `LAMB`: second family, 12-byte block headers
/// - `MLAB`: second family, 16-byte block headers, optional out-of-line struct headers
/// - `BLM!`: second family, latest, 16-byte block headers, inline struct headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "blam")]
    Legacy,
    #[serde(rename = "ambl")]
    Ambl,
    #[serde(rename = "LAMB")]
    Lamb,
    #[serde(rename = "MLAB")]
    Mlab,
    #[serde(rename = "BLM!")]
    Latest,
}

/// Where (if anywhere) a generation stores the header of a nested struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructHeaderPlacement {
    None,
    /// In the parent stream, detected by peeking for the expected name.
    OutOfLine,
    /// Directly before the struct's fields, inside the element.
    Inline,
}

impl Engine {
    pub const ALL: [Engine; 5] = [
        Engine::Legacy,
        Engine::Ambl,
        Engine::Lamb,
        Engine::Mlab,
        Engine::Latest,
    ];

    /// The marker as it reads logically (not as stored on disk).
    pub fn marker(self) -> [u8; 4] {
        match self {
            Engine::Legacy => *b"blam",
            Engine::Ambl => *b"ambl",
            Engine::Lamb => *b"LAMB",
            Engine::Mlab => *b"MLAB",
            Engine::Latest => *b"BLM!",
        }
    }

    pub fn from_marker(marker: [u8; 4]) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.marker() == marker)
    }

    /// Identify the engine from the last four bytes of a tag header.
    ///
    /// Little-endian generations store the marker reversed, so both
    /// orientations are tried.
    pub fn detect(stored: [u8; 4]) -> Result<Self> {
        if let Some(engine) = Self::from_marker(stored) {
            if engine.endian() == Endian::Big {
                return Ok(engine);
            }
        }
        let mut reversed = stored;
        reversed.reverse();
        match Self::from_marker(reversed) {
            Some(engine) if engine.endian() == Endian::Little => Ok(engine),
            _ => Err(Error::UnknownEngine { found: stored }),
        }
    }

    pub fn endian(self) -> Endian {
        match self {
            Engine::Legacy => Endian::Big,
            _ => Endian::Little,
        }
    }

    /// Byte order of the header checksum field.
    pub fn checksum_endian(self) -> Endian {
        match self {
            Engine::Legacy | Engine::Ambl => Endian::Big,
            _ => Endian::Little,
        }
    }

    /// Size of the per-block header, or `None` when blocks carry no header.
    pub fn block_header_size(self) -> Option<usize> {
        match self {
            Engine::Legacy => None,
            Engine::Ambl | Engine::Lamb => Some(12),
            Engine::Mlab | Engine::Latest => Some(16),
        }
    }

    /// Whether the block header has its own element count (16-byte form).
    pub fn block_header_has_count(self) -> bool {
        self.block_header_size() == Some(16)
    }

    pub fn struct_header(self) -> StructHeaderPlacement {
        match self {
            Engine::Legacy | Engine::Ambl | Engine::Lamb => StructHeaderPlacement::None,
            Engine::Mlab => StructHeaderPlacement::OutOfLine,
            Engine::Latest => StructHeaderPlacement::Inline,
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(std::str::from_utf8(&self.marker()).unwrap_or("????"))
    }
}

impl std::str::FromStr for Engine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 4] = s
            .as_bytes()
            .try_into()
            .map_err(|_| Error::UnknownEngine { found: [0; 4] })?;
        Self::from_marker(bytes).ok_or(Error::UnknownEngine { found: bytes })
    }
}
