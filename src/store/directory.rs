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
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::anyhow;

use super::object_store::{Listing, ObjectStore};
use crate::{Error, Result};

/// An `ObjectStore` which stores objects in a directory in the local file
/// system.
///
/// Keys are regular files and child namespaces are directories. Files and
/// directories are created with permissions restricting access to the owner.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    /// The path of the store's root directory.
    path: PathBuf,
}

impl DirectoryStore {
    /// Create a store rooted at `path`.
    ///
    /// The directory does not need to exist yet; it is created by the first
    /// [`put`].
    ///
    /// [`put`]: crate::store::ObjectStore::put
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DirectoryStore { path: path.into() }
    }
}

impl ObjectStore for DirectoryStore {
    fn abs(&self, key: &str) -> String {
        self.path.join(key).to_string_lossy().into_owned()
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path.join(key);

        if let Some(parent) = path.parent() {
            let mut builder = DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o700);
            }
            builder.create(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&path)?;
        file.write_all(data)?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        match fs::read(self.path.join(key)) {
            Ok(data) => Ok(data),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(error) => Err(error.into()),
        }
    }

    fn list(&self) -> Result<Listing> {
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Listing::default())
            }
            Err(error) => return Err(error.into()),
        };

        let mut listing = Listing::default();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                listing.children.push(name);
            } else {
                listing.keys.push(name);
            }
        }

        listing.keys.sort();
        listing.children.sort();

        Ok(listing)
    }

    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>> {
        Ok(Box::new(DirectoryStore::new(self.path.join(child))))
    }

    fn destroy(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }

        // A store rooted directly under the file system root is assumed to be
        // a misconfiguration.
        let root = self.path.canonicalize()?;
        if root.parent().map_or(true, |parent| parent.parent().is_none()) {
            return Err(Error::Store(anyhow!(
                "refusing to destroy top-level directory {:?}",
                root
            )));
        }

        fs::remove_dir_all(&self.path)?;

        Ok(())
    }
}
