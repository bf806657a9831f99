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

use sodiumoxide::crypto::secretbox;

use super::object_store::{Listing, ObjectStore};
use crate::env::init;
use crate::key::SecretKey;
use crate::{Error, Result};

/// The fixed overhead added to every sealed value: the nonce followed by the
/// authentication tag.
pub const BOX_OVERHEAD: usize = secretbox::NONCEBYTES + secretbox::MACBYTES;

/// An `ObjectStore` which transparently seals each value with authenticated
/// encryption.
///
/// Values are sealed with XSalsa20-Poly1305 under a shared [`SecretKey`],
/// using a fresh random nonce per [`put`]. Keys and namespace structure are
/// never encrypted; [`list`], [`descend`], [`destroy`], and [`abs`] pass
/// through to the wrapped store unchanged.
///
/// [`SecretKey`]: crate::key::SecretKey
/// [`put`]: crate::store::ObjectStore::put
/// [`list`]: crate::store::ObjectStore::list
/// [`descend`]: crate::store::ObjectStore::descend
/// [`destroy`]: crate::store::ObjectStore::destroy
/// [`abs`]: crate::store::ObjectStore::abs
#[derive(Debug)]
pub struct EncryptedStore {
    inner: Box<dyn ObjectStore>,
    key: Arc<SecretKey>,
}

impl EncryptedStore {
    /// Wrap `inner`, sealing values under `key`.
    pub fn new(inner: Box<dyn ObjectStore>, key: Arc<SecretKey>) -> Self {
        init();
        EncryptedStore { inner, key }
    }
}

/// Seal `data`, prepending the nonce to the ciphertext.
fn seal(data: &[u8], key: &secretbox::Key) -> Vec<u8> {
    let nonce = secretbox::gen_nonce();
    let mut sealed = nonce.as_ref().to_vec();
    sealed.append(&mut secretbox::seal(data, &nonce, key));
    sealed
}

/// Open a sealed value produced by [`seal`].
fn open(sealed: &[u8], key: &secretbox::Key) -> Result<Vec<u8>> {
    if sealed.len() < BOX_OVERHEAD {
        return Err(Error::Authentication);
    }
    let nonce = secretbox::Nonce::from_slice(&sealed[..secretbox::NONCEBYTES]).unwrap();
    secretbox::open(&sealed[secretbox::NONCEBYTES..], &nonce, key)
        .map_err(|_| Error::Authentication)
}

impl ObjectStore for EncryptedStore {
    fn abs(&self, key: &str) -> String {
        self.inner.abs(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.inner.put(key, &seal(data, &self.key.as_cipher_key()))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let sealed = self.inner.get(key)?;
        open(&sealed, &self.key.as_cipher_key())
    }

    fn list(&self) -> Result<Listing> {
        self.inner.list()
    }

    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>> {
        Ok(Box::new(EncryptedStore {
            inner: self.inner.descend(child)?,
            key: Arc::clone(&self.key),
        }))
    }

    fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}
