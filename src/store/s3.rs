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
use std::path::Path;
use std::sync::Arc;

use super::object_store::{Listing, ObjectStore};
use crate::remote::Bucket;
use crate::{Error, Result};

/// An `ObjectStore` which stores objects in an S3-compatible bucket.
///
/// The bucket's flat key space is made hierarchical by treating `/` as a
/// delimiter: keys under this store share a prefix, and descending extends
/// it. Listing groups deeper keys into child namespaces with a delimited
/// listing request; a listing the service truncates is surfaced as
/// [`Error::TruncatedListing`] rather than paginated.
///
/// [`Error::TruncatedListing`]: crate::Error::TruncatedListing
#[derive(Debug)]
pub struct S3Store {
    bucket: Arc<Bucket>,
    prefix: String,
}

impl S3Store {
    /// Wrap the remote `bucket`, addressing keys at its root.
    pub fn new(bucket: Bucket) -> Self {
        S3Store {
            bucket: Arc::new(bucket),
            prefix: String::new(),
        }
    }

    /// Open the bucket described by the JSON configuration file at `path`.
    ///
    /// # Errors
    /// - `Error::Deserialize`: The configuration file is malformed.
    /// - `Error::Io`: An I/O error occurred.
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(S3Store::new(Bucket::from_file(path)?))
    }

    /// Strip this store's prefix from a key returned by the service.
    fn relative(&self, key: &str) -> String {
        key.strip_prefix(&self.prefix).unwrap_or(key).to_owned()
    }
}

impl ObjectStore for S3Store {
    fn abs(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.bucket.put(&self.abs(key), data)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.bucket.get(&self.abs(key))
    }

    fn list(&self) -> Result<Listing> {
        let result = self.bucket.list(&self.prefix, "/")?;
        if result.is_truncated {
            return Err(Error::TruncatedListing);
        }

        Ok(Listing {
            keys: result
                .contents
                .iter()
                .map(|key| self.relative(key))
                .collect(),
            children: result
                .common_prefixes
                .iter()
                .map(|prefix| self.relative(prefix.trim_end_matches('/')))
                .collect(),
        })
    }

    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>> {
        let mut prefix = format!("{}{}", self.prefix, child);
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Ok(Box::new(S3Store {
            bucket: Arc::clone(&self.bucket),
            prefix,
        }))
    }

    fn destroy(&self) -> Result<()> {
        loop {
            let listing = self.bucket.list(&self.prefix, "")?;
            if listing.contents.is_empty() {
                return Ok(());
            }

            let errors = self.bucket.delete(&listing.contents)?;
            if let Some(first) = errors.into_iter().next() {
                return Err(Error::Store(anyhow::Error::new(first)));
            }
        }
    }
}
