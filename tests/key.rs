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
use std::sync::Arc;

use tempfile::tempdir;

use strongbox::key::{self, SecretKey};
use strongbox::store::{EncryptedStore, MemoryStore, ObjectStore};
use strongbox::Error;

use common::random_buffer;

mod common;

#[test]
fn key_file_round_trips() -> anyhow::Result<()> {
    strongbox::init();
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("strongbox.key");

    let key = SecretKey::generate();
    key::save(&key, &path, "correct horse battery staple")?;
    let restored = key::load(&path, "correct horse battery staple")?;

    // The restored key opens boxes sealed under the original.
    let raw = MemoryStore::new();
    let data = random_buffer();
    EncryptedStore::new(Box::new(raw.clone()), Arc::new(key)).put("secret", &data)?;
    let reopened = EncryptedStore::new(Box::new(raw), Arc::new(restored));
    assert_eq!(reopened.get("secret")?, data);

    Ok(())
}

#[test]
fn wrong_passphrase_is_rejected() -> anyhow::Result<()> {
    strongbox::init();
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("strongbox.key");

    key::save(&SecretKey::generate(), &path, "correct")?;

    let error = key::load(&path, "incorrect").unwrap_err();
    assert!(matches!(error, Error::Passphrase));

    Ok(())
}

#[test]
fn changing_the_passphrase_keeps_the_key() -> anyhow::Result<()> {
    strongbox::init();
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("strongbox.key");

    let key = SecretKey::generate();
    key::save(&key, &path, "old passphrase")?;

    let loaded = key::load(&path, "old passphrase")?;
    key::save(&loaded, &path, "new passphrase")?;

    assert!(matches!(
        key::load(&path, "old passphrase").unwrap_err(),
        Error::Passphrase
    ));

    // The re-wrapped key still opens boxes sealed under the original.
    let raw = MemoryStore::new();
    let data = random_buffer();
    EncryptedStore::new(Box::new(raw.clone()), Arc::new(key)).put("secret", &data)?;
    let reopened = EncryptedStore::new(
        Box::new(raw),
        Arc::new(key::load(&path, "new passphrase")?),
    );
    assert_eq!(reopened.get("secret")?, data);

    Ok(())
}

#[test]
fn malformed_key_files_are_rejected() -> anyhow::Result<()> {
    strongbox::init();
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("strongbox.key");

    std::fs::write(&path, b"not a key file")?;

    let error = key::load(&path, "anything").unwrap_err();
    assert!(matches!(error, Error::Deserialize));

    Ok(())
}
