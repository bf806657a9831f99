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

//! Storage backends and the decorators that wrap them.
//!
//! Every store implements the [`ObjectStore`] trait, a hierarchical key/value
//! namespace. Backends map the namespace onto real storage:
//! [`DirectoryStore`] onto a local directory tree, [`S3Store`] onto an
//! S3-compatible bucket, and [`MemoryStore`] onto process memory.
//!
//! [`EncryptedStore`] and [`RecoverableStore`] hold another store and add
//! behavior to it, encryption of values and retry of failed operations, so a
//! stack is composed by nesting constructors:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use strongbox::key::SecretKey;
//! use strongbox::store::{
//!     ConsolePrompt, DirectoryStore, EncryptedStore, RecoverableStore,
//! };
//!
//! let key = Arc::new(SecretKey::generate());
//! let store = RecoverableStore::new(
//!     Box::new(EncryptedStore::new(
//!         Box::new(DirectoryStore::new("/var/backups/strongbox")),
//!         key,
//!     )),
//!     Arc::new(ConsolePrompt::new()),
//! );
//! ```
//!
//! [`ObjectStore`]: crate::store::ObjectStore
//! [`DirectoryStore`]: crate::store::DirectoryStore
//! [`S3Store`]: crate::store::S3Store
//! [`MemoryStore`]: crate::store::MemoryStore
//! [`EncryptedStore`]: crate::store::EncryptedStore
//! [`RecoverableStore`]: crate::store::RecoverableStore

pub use self::directory::DirectoryStore;
pub use self::encrypted::{EncryptedStore, BOX_OVERHEAD};
pub use self::memory::MemoryStore;
pub use self::object_store::{Listing, ObjectStore};
pub use self::recoverable::{ConsolePrompt, Prompt, RecoverableStore, RETRY_DELAY};
pub use self::s3::S3Store;

mod directory;
mod encrypted;
mod memory;
mod object_store;
mod recoverable;
mod s3;
