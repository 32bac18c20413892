//! Reader/writer for Blam engine binary tag files.
//!
//! Three-layer architecture:
//! - **Layer 1** (`cursor`/`header`/`checksum`): Raw byte I/O: 64-byte tag
//!   header, block headers, body checksum
//! - **Layer 2** (`schema`/`codec`): Typed schema graph and the field codec,
//!   including the Block/Struct engine
//! - **Layer 3** (`file`/`migrate`/`deps`/`cache`/`batch`): Whole files,
//!   layout upgrades, dependency walking, on-disk cache, batch verification

pub mod batch;
pub mod cache;
pub mod checksum;
pub mod codec;
pub mod cursor;
pub mod deps;
pub mod engine;
pub mod error;
pub mod file;
pub mod fourcc;
pub mod header;
pub mod migrate;
pub mod schema;
pub mod value;

pub use batch::{convert_dir, verify_round_trip, BatchReport, ConvertOptions};
pub use cache::TagCache;
pub use checksum::{checksum, obfuscation_buffer};
pub use codec::{CodecContext, FieldCodec};
pub use deps::{DependencyWalker, WalkReport};
pub use engine::{Endian, Engine};
pub use error::{Error, FileError, Result, Stage};
pub use file::{ReadOptions, Tag, WriteOptions};
pub use fourcc::FourCC;
pub use header::{BlockHeader, TagHeader};
pub use migrate::{Migration, MigrationConfig, MigrationTable};
pub use schema::{SchemaSet, TagGroup};
pub use value::{Block, Struct, TagData, TagRef, Value};
