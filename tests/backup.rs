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

//! These tests drive the real `tar` binary, like the backup engine does.

#![cfg(unix)]

use std::fs;

use tempfile::tempdir;

use strongbox::backup;
use strongbox::store::{MemoryStore, ObjectStore};
use strongbox::Error;

use common::{encrypted, random_bytes};

mod common;

const CHUNK_SIZE: usize = 64 * 1024;

#[test]
fn backups_restore_byte_for_byte() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let source = temp_dir.path().join("source");
    fs::create_dir(&source)?;
    fs::write(source.join("lorem.txt"), b"Lorem ipsum dolor sit amet\n")?;
    fs::write(source.join("large.data"), random_bytes(CHUNK_SIZE * 3 + 17))?;
    fs::create_dir(source.join("nested"))?;
    fs::write(source.join("nested/inner.data"), random_bytes(512))?;

    let store = encrypted(MemoryStore::new());

    let stored = backup::create(
        store.descend("backup")?,
        CHUNK_SIZE,
        Some(temp_dir.path()),
        &["source".to_owned()],
    )?;
    assert!(stored > 0);

    let dest = temp_dir.path().join("dest");
    let read = backup::restore(store.descend("backup")?, &dest)?;
    assert_eq!(read, stored);

    for name in ["lorem.txt", "large.data", "nested/inner.data"] {
        assert_eq!(
            fs::read(source.join(name))?,
            fs::read(dest.join("source").join(name))?,
            "{} differs after restore",
            name
        );
    }

    Ok(())
}

#[test]
fn restore_refuses_an_existing_destination() -> anyhow::Result<()> {
    let temp_dir = tempdir()?;
    let store = MemoryStore::new();

    backup::create(
        Box::new(store.clone()),
        CHUNK_SIZE,
        Some(temp_dir.path()),
        &[".".to_owned()],
    )?;

    let error = backup::restore(Box::new(store), temp_dir.path()).unwrap_err();
    assert!(matches!(error, Error::Io(_)));

    Ok(())
}

#[test]
fn a_missing_source_path_surfaces_the_archiver_error() {
    let store = MemoryStore::new();

    let error = backup::create(
        Box::new(store),
        CHUNK_SIZE,
        None,
        &["/definitely/not/a/real/path".to_owned()],
    )
    .unwrap_err();

    assert!(matches!(error, Error::Archiver(_)));
}
