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
use std::fmt;

use static_assertions::assert_obj_safe;

use crate::Result;

/// The contents of one level of a store's namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// The keys of the objects at this level.
    pub keys: Vec<String>,

    /// The names of the child namespaces at this level.
    pub children: Vec<String>,
}

/// A hierarchical key/value namespace for storing objects.
///
/// An `ObjectStore` maps string keys to binary values and contains named
/// child namespaces, recursively. Keys are opaque at the [`put`]/[`get`]
/// boundary: a key containing `/` reaches into child namespaces, so
/// `store.get("child/key")` returns the same value as
/// `store.descend("child")?.get("key")`.
///
/// Implementations are cheap to construct and hold no state beyond their
/// configuration; descending does not create anything in the underlying
/// storage.
///
/// [`put`]: crate::store::ObjectStore::put
/// [`get`]: crate::store::ObjectStore::get
pub trait ObjectStore: fmt::Debug + Send {
    /// Return an absolute locator for `key` in the underlying storage.
    ///
    /// The result is backend-specific and only suitable for diagnostics; it
    /// is never parsed back into a key.
    fn abs(&self, key: &str) -> String;

    /// Store `data` under `key`, overwriting any existing value.
    ///
    /// Any missing intermediate namespaces are created.
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Return the exact bytes previously stored under `key`.
    ///
    /// An empty value is valid and distinct from a missing key.
    ///
    /// # Errors
    /// - `Error::NotFound`: There is no value stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Return the keys and child namespaces at this level.
    ///
    /// An empty or nonexistent namespace produces an empty listing, not an
    /// error. The ordering is deterministic for a given backend.
    fn list(&self) -> Result<Listing>;

    /// Return a store scoped to the `child` sub-namespace.
    ///
    /// Descending is referentially transparent: repeated calls with the same
    /// name address the same sub-namespace. It never fails merely because the
    /// sub-namespace does not exist yet.
    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>>;

    /// Delete this namespace and everything beneath it.
    ///
    /// Destroying an empty or nonexistent namespace succeeds.
    fn destroy(&self) -> Result<()>;
}

assert_obj_safe!(ObjectStore);

impl ObjectStore for Box<dyn ObjectStore> {
    fn abs(&self, key: &str) -> String {
        self.as_ref().abs(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.as_ref().put(key, data)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.as_ref().get(key)
    }

    fn list(&self) -> Result<Listing> {
        self.as_ref().list()
    }

    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>> {
        self.as_ref().descend(child)
    }

    fn destroy(&self) -> Result<()> {
        self.as_ref().destroy()
    }
}
