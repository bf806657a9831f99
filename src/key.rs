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

//! The long-lived secret key and its passphrase-protected key file.

use std::fmt::{self, Debug, Formatter};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret, SecretVec};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use sodiumoxide::crypto::pwhash::argon2id13::{
    derive_key, gen_salt, Salt, MEMLIMIT_INTERACTIVE, OPSLIMIT_INTERACTIVE,
};
use sodiumoxide::crypto::secretbox;

use crate::env::init;
use crate::{Error, Result};

/// The size of a [`SecretKey`] in bytes.
///
/// [`SecretKey`]: crate::key::SecretKey
pub const KEY_SIZE: usize = secretbox::KEYBYTES;

/// A symmetric secret key.
///
/// A key is loaded once per process and shared read-only by every
/// [`EncryptedStore`] derived from it. The bytes of the key are zeroed in
/// memory when this value is dropped.
///
/// [`EncryptedStore`]: crate::store::EncryptedStore
pub struct SecretKey(SecretVec<u8>);

impl Debug for SecretKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl SecretKey {
    /// Generate a new random key.
    ///
    /// This uses bytes retrieved from the operating system's cryptographically
    /// secure random number generator.
    pub fn generate() -> Self {
        init();
        let mut bytes = vec![0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        SecretKey(Secret::new(bytes))
    }

    /// Create a key from the given `bytes`.
    ///
    /// # Errors
    /// - `Error::Deserialize`: `bytes` is not exactly [`KEY_SIZE`] bytes long.
    ///
    /// [`KEY_SIZE`]: crate::key::KEY_SIZE
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::Deserialize);
        }
        Ok(SecretKey(Secret::new(bytes)))
    }

    /// Return this key as a cipher key.
    pub(crate) fn as_cipher_key(&self) -> secretbox::Key {
        secretbox::Key::from_slice(self.0.expose_secret()).unwrap()
    }
}

/// The serialized form of a key file: the secret key sealed under a key
/// derived from a passphrase.
#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyFile {
    /// The salt the wrapping key was derived with.
    #[serde_as(as = "Base64")]
    salt: Vec<u8>,

    /// The nonce the key was sealed with.
    #[serde_as(as = "Base64")]
    nonce: Vec<u8>,

    /// The sealed secret key.
    #[serde_as(as = "Base64")]
    key: Vec<u8>,
}

/// Derive the key used to seal the key file from a passphrase.
fn wrapping_key(passphrase: &str, salt: &Salt) -> secretbox::Key {
    let mut key = secretbox::Key([0u8; KEY_SIZE]);
    derive_key(
        &mut key.0,
        passphrase.as_bytes(),
        salt,
        OPSLIMIT_INTERACTIVE,
        MEMLIMIT_INTERACTIVE,
    )
    .expect("Failed to derive a wrapping key.");
    key
}

/// Write `key` to a key file at `path`, sealed under `passphrase`.
///
/// The file is created with permissions restricting access to the owner. An
/// existing file is overwritten, which is how a passphrase is changed.
///
/// # Errors
/// - `Error::Serialize`: The key file could not be serialized.
/// - `Error::Io`: An I/O error occurred.
pub fn save(key: &SecretKey, path: &Path, passphrase: &str) -> Result<()> {
    init();

    let salt = gen_salt();
    let wrapping = wrapping_key(passphrase, &salt);
    let nonce = secretbox::gen_nonce();
    let sealed = secretbox::seal(key.0.expose_secret(), &nonce, &wrapping);

    let document = KeyFile {
        salt: salt.as_ref().to_vec(),
        nonce: nonce.as_ref().to_vec(),
        key: sealed,
    };
    let json = serde_json::to_vec_pretty(&document).map_err(|_| Error::Serialize)?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(&json)?;

    Ok(())
}

/// Read the key file at `path`, opening it with `passphrase`.
///
/// # Errors
/// - `Error::Deserialize`: The key file is malformed.
/// - `Error::Passphrase`: The passphrase does not open the key file.
/// - `Error::Io`: An I/O error occurred.
pub fn load(path: &Path, passphrase: &str) -> Result<SecretKey> {
    init();

    let data = fs::read(path)?;
    let document: KeyFile = serde_json::from_slice(&data).map_err(|_| Error::Deserialize)?;

    let salt = Salt::from_slice(&document.salt).ok_or(Error::Deserialize)?;
    let nonce = secretbox::Nonce::from_slice(&document.nonce).ok_or(Error::Deserialize)?;
    let wrapping = wrapping_key(passphrase, &salt);

    let bytes = secretbox::open(&document.key, &nonce, &wrapping).map_err(|_| Error::Passphrase)?;
    SecretKey::from_bytes(bytes)
}
