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
use std::fmt::{self, Debug, Formatter};
use std::io;

use sha2::{Digest, Sha256};

use super::{chunk_key, Manifest, MANIFEST_KEY, MANIFEST_VERSION};
use crate::store::ObjectStore;
use crate::{Error, Result};

/// Reassembles a chunked byte stream, verifying each chunk's digest.
///
/// The reader fetches the manifest on construction, then fetches chunks in
/// order as it is read from, comparing each chunk's SHA-256 against the
/// manifest entry before yielding its bytes. A mismatch is surfaced as
/// [`Error::Integrity`]: corruption must never be masked by retrying, and
/// since the chunk's position is not advanced, every subsequent read fails
/// the same way. The stream ends cleanly once every chunk has been consumed.
///
/// A reader is owned by a single transfer and is not safe to share.
///
/// [`Error::Integrity`]: crate::Error::Integrity
pub struct ChunkReader {
    store: Box<dyn ObjectStore>,
    boxes: Vec<[u8; 32]>,
    next_chunk: usize,
    buf: Vec<u8>,
    pos: usize,
    total: u64,
}

impl Debug for ChunkReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChunkReader {{ store: {:?}, chunks: {} }}",
            self.store,
            self.boxes.len()
        )
    }
}

impl ChunkReader {
    /// Create a reader for the stream stored in `store`.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no manifest in the store.
    /// - `Error::Deserialize`: The manifest is malformed.
    /// - `Error::UnsupportedVersion`: The manifest format is not supported.
    pub fn new(store: Box<dyn ObjectStore>) -> Result<Self> {
        let data = store.get(MANIFEST_KEY)?;
        let manifest: Manifest =
            serde_json::from_slice(&data).map_err(|_| Error::Deserialize)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(Error::UnsupportedVersion);
        }

        Ok(ChunkReader {
            store,
            boxes: manifest.boxes,
            next_chunk: 0,
            buf: Vec::new(),
            pos: 0,
            total: 0,
        })
    }

    /// Fetch and verify the next chunk, returning `false` at the end of the
    /// stream.
    fn fill(&mut self) -> Result<bool> {
        if self.next_chunk == self.boxes.len() {
            return Ok(false);
        }

        let key = chunk_key(self.next_chunk);
        let data = self.store.get(&key)?;
        let digest: [u8; 32] = Sha256::digest(&data).into();
        if digest != self.boxes[self.next_chunk] {
            return Err(Error::Integrity);
        }

        self.buf = data;
        self.pos = 0;
        self.next_chunk += 1;

        Ok(true)
    }

    /// Return the total number of bytes produced so far.
    pub fn size(&self) -> u64 {
        self.total
    }
}

impl io::Read for ChunkReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.buf.len() {
            match self.fill() {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(error) => return Err(io::Error::new(io::ErrorKind::Other, error)),
            }
        }

        let count = out.len().min(self.buf.len() - self.pos);
        out[..count].copy_from_slice(&self.buf[self.pos..self.pos + count]);
        self.pos += count;
        self.total += count as u64;

        Ok(count)
    }
}
