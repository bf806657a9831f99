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

//! `strongbox` streams archived file trees into a local or remote object
//! store, splitting the stream into integrity-checked chunks and optionally
//! sealing each chunk with authenticated encryption.
//!
//! Storage is abstracted behind the [`ObjectStore`] trait, a hierarchical
//! key/value namespace. The following stores are provided out of the box:
//! - [`DirectoryStore`] stores objects in a directory in the local file
//! system.
//! - [`S3Store`] stores objects in an S3-compatible bucket, speaking the wire
//! protocol directly and signing each request by hand.
//! - [`MemoryStore`] stores objects in memory.
//!
//! Two stores wrap another store to add behavior and can be nested in any
//! order:
//! - [`EncryptedStore`] transparently seals each value with authenticated
//! encryption under a shared [`SecretKey`].
//! - [`RecoverableStore`] retries failed operations, escalating to an
//! operator prompt when a failure persists.
//!
//! A byte stream is stored as a sequence of fixed-size chunks plus a manifest
//! by [`ChunkWriter`], and reassembled by [`ChunkReader`], which verifies
//! each chunk's digest. The [`backup`] module drives an external `tar`
//! process through that pipeline.
//!
//! [`ObjectStore`]: crate::store::ObjectStore
//! [`DirectoryStore`]: crate::store::DirectoryStore
//! [`S3Store`]: crate::store::S3Store
//! [`MemoryStore`]: crate::store::MemoryStore
//! [`EncryptedStore`]: crate::store::EncryptedStore
//! [`RecoverableStore`]: crate::store::RecoverableStore
//! [`SecretKey`]: crate::key::SecretKey
//! [`ChunkWriter`]: crate::stream::ChunkWriter
//! [`ChunkReader`]: crate::stream::ChunkReader
//!
//! # Examples
//! ```
//! use std::io::Read;
//!
//! use strongbox::store::MemoryStore;
//! use strongbox::stream::{ChunkReader, ChunkWriter};
//!
//! fn main() -> strongbox::Result<()> {
//!     let store = MemoryStore::new();
//!
//!     // Split a byte stream into chunks of up to 1 KiB.
//!     let mut writer = ChunkWriter::new(Box::new(store.clone()), 1024);
//!     writer.write(b"backup payload")?;
//!     writer.close()?;
//!
//!     // Reassemble the stream, verifying each chunk's digest.
//!     let mut reader = ChunkReader::new(Box::new(store))?;
//!     let mut data = Vec::new();
//!     reader.read_to_end(&mut data)?;
//!
//!     assert_eq!(data, b"backup payload");
//!
//!     Ok(())
//! }
//! ```

pub use env::init;
pub use error::{Error, Result};

mod env;
mod error;

pub mod backup;
pub mod key;
pub mod remote;
pub mod store;
pub mod stream;
