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
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::{chunk_key, Manifest, MANIFEST_KEY, MANIFEST_VERSION};
use crate::store::ObjectStore;
use crate::{Error, Result};

/// The writer's terminal states. A store failure is sticky: once a chunk
/// fails to store, every later call fails with the same underlying error.
enum State {
    Open,
    Closed,
    Failed(Arc<Error>),
}

/// Splits a byte stream into fixed-size chunks stored under sequence keys.
///
/// Bytes are buffered internally and flushed as a chunk whenever the buffer
/// fills. [`close`] flushes the final partial chunk and stores the manifest;
/// a writer must be closed for the stream to be readable later. Writers also
/// implement [`std::io::Write`] so they can serve as an external process's
/// standard output.
///
/// A writer is owned by a single transfer and is not safe to share.
///
/// [`close`]: crate::stream::ChunkWriter::close
pub struct ChunkWriter {
    store: Box<dyn ObjectStore>,
    chunk_size: usize,
    buf: Vec<u8>,
    boxes: Vec<[u8; 32]>,
    total: u64,
    state: State,
}

impl Debug for ChunkWriter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChunkWriter {{ store: {:?}, chunk_size: {} }}",
            self.store, self.chunk_size
        )
    }
}

impl ChunkWriter {
    /// Create a writer storing chunks of up to `chunk_size` bytes in `store`.
    pub fn new(store: Box<dyn ObjectStore>, chunk_size: usize) -> Self {
        ChunkWriter {
            store,
            chunk_size,
            buf: Vec::with_capacity(chunk_size),
            boxes: Vec::new(),
            total: 0,
            state: State::Open,
        }
    }

    /// Fail if the writer is closed or a previous call failed.
    fn guard(&self) -> Result<()> {
        match &self.state {
            State::Open => Ok(()),
            State::Closed => Err(Error::Closed),
            State::Failed(error) => Err(Error::Store(anyhow::Error::new(Arc::clone(error)))),
        }
    }

    /// Record `error` as the writer's terminal state and return it.
    fn fail(&mut self, error: Error) -> Error {
        let error = Arc::new(error);
        self.state = State::Failed(Arc::clone(&error));
        Error::Store(anyhow::Error::new(error))
    }

    /// Store the buffered chunk, if any, and record its digest.
    fn flush_chunk(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let key = chunk_key(self.boxes.len());
        self.store.put(&key, &self.buf)?;
        self.boxes.push(Sha256::digest(&self.buf).into());
        self.buf.clear();
        Ok(())
    }

    /// Append `data` to the stream, flushing full chunks as the internal
    /// buffer fills.
    ///
    /// # Errors
    /// - `Error::Closed`: The writer has been closed.
    /// - Any error from the underlying store. After a store failure, every
    /// later call fails with the same error.
    pub fn write(&mut self, mut data: &[u8]) -> Result<usize> {
        self.guard()?;

        let mut written = 0;
        while data.len() > self.chunk_size - self.buf.len() {
            let take = self.chunk_size - self.buf.len();
            self.buf.extend_from_slice(&data[..take]);
            written += take;
            data = &data[take..];

            if let Err(error) = self.flush_chunk() {
                self.total += written as u64;
                return Err(self.fail(error));
            }
        }

        self.buf.extend_from_slice(data);
        written += data.len();
        self.total += written as u64;

        Ok(written)
    }

    /// Flush the final partial chunk, store the manifest, and close the
    /// writer.
    ///
    /// # Errors
    /// - `Error::Closed`: The writer has already been closed.
    /// - Any error from the underlying store.
    pub fn close(&mut self) -> Result<()> {
        self.guard()?;

        if let Err(error) = self.flush_chunk() {
            return Err(self.fail(error));
        }

        let manifest = Manifest {
            version: MANIFEST_VERSION,
            boxes: self.boxes.clone(),
        };
        let json = match serde_json::to_vec(&manifest) {
            Ok(json) => json,
            Err(_) => return Err(self.fail(Error::Serialize)),
        };
        if let Err(error) = self.store.put(MANIFEST_KEY, &json) {
            return Err(self.fail(error));
        }

        self.state = State::Closed;

        Ok(())
    }

    /// Return the total number of bytes accepted so far.
    pub fn size(&self) -> u64 {
        self.total
    }
}

impl io::Write for ChunkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ChunkWriter::write(self, buf).map_err(|error| io::Error::new(io::ErrorKind::Other, error))
    }

    fn flush(&mut self) -> io::Result<()> {
        // Chunks are flushed on their own boundaries.
        Ok(())
    }
}
