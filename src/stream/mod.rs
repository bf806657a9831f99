/*
 * Copyright 2019-2021 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Chunked serialization of byte streams.
//!
//! [`ChunkWriter`] splits an arbitrary byte stream into fixed-size chunks,
//! storing each chunk under a zero-padded sequence key (`"00000"`,
//! `"00001"`, …) and recording its SHA-256 digest. Closing the writer stores
//! a [`Manifest`] listing the digests in order under the reserved key
//! [`MANIFEST_KEY`]. [`ChunkReader`] reverses the process, verifying each
//! chunk against the manifest before yielding its bytes.
//!
//! [`ChunkWriter`]: crate::stream::ChunkWriter
//! [`ChunkReader`]: crate::stream::ChunkReader
//! [`Manifest`]: crate::stream::Manifest
//! [`MANIFEST_KEY`]: crate::stream::MANIFEST_KEY

pub use self::reader::ChunkReader;
pub use self::writer::ChunkWriter;

mod reader;
mod writer;

use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

/// The key reserved for the manifest object.
pub const MANIFEST_KEY: &str = "meta";

/// The default chunk size: 64 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// The manifest format version this crate writes.
const MANIFEST_VERSION: u32 = 0;

/// The key the chunk at `index` is stored under.
fn chunk_key(index: usize) -> String {
    format!("{:05}", index)
}

/// The ordered list of chunk digests for one stored stream.
///
/// The manifest is owned by the [`ChunkWriter`] until it is closed, after
/// which it is immutable and persisted under [`MANIFEST_KEY`].
///
/// [`ChunkWriter`]: crate::stream::ChunkWriter
/// [`MANIFEST_KEY`]: crate::stream::MANIFEST_KEY
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    /// The manifest format version.
    pub version: u32,

    /// The SHA-256 digest of each chunk, in stream order.
    #[serde_as(as = "Vec<Base64>")]
    pub boxes: Vec<[u8; 32]>,
}
