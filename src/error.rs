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
use std::io;
use std::result;

use thiserror::Error as DeriveError;

/// The error type for operations with an object store.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// A key was not found in the store.
    #[error("A key was not found.")]
    NotFound,

    /// A sealed value failed authentication, or the remote service rejected
    /// our credentials.
    #[error("An authentication check failed.")]
    Authentication,

    /// A chunk's contents did not match the digest recorded in the manifest.
    #[error("A chunk did not match its recorded digest.")]
    Integrity,

    /// The provided passphrase was invalid.
    #[error("The provided passphrase was invalid.")]
    Passphrase,

    /// The remote service truncated a listing.
    #[error("The remote service truncated a listing.")]
    TruncatedListing,

    /// The manifest format is not supported by this version of the library.
    #[error("The manifest format is not supported by this version of the library.")]
    UnsupportedVersion,

    /// A value could not be serialized.
    #[error("A value could not be serialized.")]
    Serialize,

    /// A value could not be deserialized.
    #[error("A value could not be deserialized.")]
    Deserialize,

    /// The writer has already been closed.
    #[error("The writer has already been closed.")]
    Closed,

    /// The external archiver exited unsuccessfully.
    #[error("The archiver failed: {0}")]
    Archiver(String),

    /// An operation was abandoned after its retries were declined.
    #[error("{operation}({key:?}) failed: {source}")]
    Failed {
        /// The name of the store operation which failed.
        operation: &'static str,

        /// The key the operation was called with.
        key: String,

        /// The error which caused the operation to be abandoned.
        source: Box<Error>,
    },

    /// An error occurred in a storage backend.
    #[error(transparent)]
    Store(#[from] anyhow::Error),

    /// An I/O error occurred.
    #[error("{0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Return whether this error means the requested key does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// Return whether retrying the failed operation could plausibly succeed.
    ///
    /// Missing keys, failed authentication, and failed integrity checks are
    /// permanent; everything else is treated as transient.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Error::NotFound | Error::Authentication | Error::Integrity
        )
    }
}

/// The result type for operations with an object store.
pub type Result<T> = result::Result<T, Error>;
