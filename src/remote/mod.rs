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

//! A minimal client for S3-compatible object storage.
//!
//! This module speaks the service's REST protocol directly (`PUT` and `GET`
//! for objects, prefix listing, and batch delete) and signs each request by
//! hand (see the `sign` module) instead of pulling in a vendor SDK.
//! [`S3Store`] maps the [`ObjectStore`] abstraction onto a [`Bucket`] from
//! this module.
//!
//! [`S3Store`]: crate::store::S3Store
//! [`ObjectStore`]: crate::store::ObjectStore
//! [`Bucket`]: crate::remote::Bucket

use std::fmt::{self, Debug, Formatter};
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use md5::Md5;
use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error as DeriveError;
use url::Url;

use crate::{Error, Result};

mod sign;
mod xml;

/// An error reported by the remote service in an XML document.
#[derive(Debug, DeriveError)]
#[error("{code} (remote service error): {message}")]
pub struct ServiceError {
    /// The service's error code, such as `NoSuchKey`.
    pub code: String,

    /// The human-readable message accompanying the code.
    pub message: String,

    /// The service's identifier for the failed request.
    pub request_id: String,
}

impl ServiceError {
    /// Parse an error response body, falling back to the HTTP status when the
    /// body carries no error document.
    fn from_document(document: &str, status: StatusCode) -> Self {
        ServiceError {
            code: xml::text(document, "Code")
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            message: xml::text(document, "Message").unwrap_or_default(),
            request_id: xml::text(document, "RequestId").unwrap_or_default(),
        }
    }
}

/// Map a service error onto the crate's error taxonomy.
fn classify(error: ServiceError) -> Error {
    match error.code.as_str() {
        "NoSuchKey" => Error::NotFound,
        "SignatureDoesNotMatch" | "InvalidAccessKeyId" | "AccessDenied" => Error::Authentication,
        _ => Error::Store(anyhow::Error::new(error)),
    }
}

/// One key deletion that failed within a batch delete.
#[derive(Debug, DeriveError)]
#[error("deleting {key:?}: {code}: {message}")]
pub struct DeleteError {
    /// The key which could not be deleted.
    pub key: String,

    /// The service's error code.
    pub code: String,

    /// The human-readable message accompanying the code.
    pub message: String,
}

/// The result of one listing request.
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Whether the service cut the listing short.
    pub is_truncated: bool,

    /// The keys of the matching objects.
    pub contents: Vec<String>,

    /// The common prefixes the matching keys were grouped under, when a
    /// delimiter was given.
    pub common_prefixes: Vec<String>,
}

impl ListResult {
    fn from_document(document: &str) -> Self {
        ListResult {
            is_truncated: xml::text(document, "IsTruncated").as_deref() == Some("true"),
            contents: xml::elements(document, "Contents")
                .iter()
                .filter_map(|contents| xml::text(contents, "Key"))
                .collect(),
            common_prefixes: xml::elements(document, "CommonPrefixes")
                .iter()
                .filter_map(|prefixes| xml::text(prefixes, "Prefix"))
                .collect(),
        }
    }
}

/// An HTTP request under construction, before signing.
pub(crate) struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// The connection parameters for one remote object-storage service.
///
/// The secret access key is never logged; the `Debug` representation redacts
/// it.
pub struct Service {
    /// The service name used in the credential scope, such as `s3`.
    pub name: String,

    /// The host the service is reached at, such as `s3.amazonaws.com`.
    pub endpoint: String,

    /// The region used in the credential scope.
    pub region: String,

    /// The access key ID identifying the credentials.
    pub access_key_id: String,

    /// The long-term secret access key.
    access_key: SecretString,

    client: Client,
}

impl Debug for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Service {{ name: {:?}, endpoint: {:?}, region: {:?}, access_key_id: {:?} }}",
            self.name, self.endpoint, self.region, self.access_key_id
        )
    }
}

fn default_service_name() -> String {
    String::from("s3")
}

fn default_endpoint() -> String {
    String::from("s3.amazonaws.com")
}

/// The serialized form of a [`Service`], as found in the configuration file.
///
/// [`Service`]: crate::remote::Service
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    pub region: String,

    pub access_key_id: String,

    pub access_key: SecretString,
}

/// The serialized form of a [`Bucket`], as found in the configuration file.
///
/// [`Bucket`]: crate::remote::Bucket
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketConfig {
    pub bucket: String,
    pub service: ServiceConfig,
}

impl Service {
    /// Build a service from its configuration, with a fresh HTTP client.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|error| Error::Store(anyhow::Error::new(error)))?;
        Ok(Service {
            name: config.name,
            endpoint: config.endpoint,
            region: config.region,
            access_key_id: config.access_key_id,
            access_key: config.access_key,
            client,
        })
    }

    /// Sign and send `request`, surfacing non-success responses as classified
    /// errors.
    fn send(&self, mut request: Request) -> Result<Response> {
        sign::sign(self, &mut request)?;

        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(body)
            .send()
            .map_err(|error| Error::Store(anyhow::Error::new(error)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let document = response.text().unwrap_or_default();
        Err(classify(ServiceError::from_document(&document, status)))
    }
}

/// One bucket within a remote object-storage service.
#[derive(Debug)]
pub struct Bucket {
    service: Service,

    /// The bucket name, which is part of the host the requests go to.
    pub name: String,

    base_url: Url,
}

/// The header carrying the request body's digest.
fn body_digest(body: &[u8]) -> (String, String) {
    (
        "x-amz-content-sha256".to_owned(),
        hex::encode(Sha256::digest(body)),
    )
}

impl Bucket {
    /// Address the bucket `name` within `service`.
    pub fn new(service: Service, name: String) -> Result<Self> {
        let base_url = Url::parse(&format!("https://{}.{}/", name, service.endpoint))
            .map_err(|error| Error::Store(anyhow::Error::new(error)))?;
        Ok(Bucket {
            service,
            name,
            base_url,
        })
    }

    /// Load a bucket descriptor from the JSON configuration file at `path`.
    ///
    /// # Errors
    /// - `Error::Deserialize`: The configuration file is malformed.
    /// - `Error::Io`: An I/O error occurred.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let config: BucketConfig =
            serde_json::from_slice(&data).map_err(|_| Error::Deserialize)?;
        Bucket::new(Service::new(config.service)?, config.bucket)
    }

    fn url(&self, key: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(&format!("/{}", key));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        url
    }

    /// Store `data` under `key`.
    ///
    /// The response must carry a checksum matching the payload, or the
    /// operation fails.
    pub fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let request = Request {
            method: Method::PUT,
            url: self.url(key, &[]),
            headers: vec![body_digest(data)],
            body: data.to_vec(),
        };
        let response = self.service.send(request)?;

        let expected = format!("\"{}\"", hex::encode(Md5::digest(data)));
        let actual = response
            .headers()
            .get("ETag")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if actual != expected {
            return Err(Error::Store(anyhow::anyhow!(
                "checksum mismatch storing {:?}: expected {}, got {}",
                key,
                expected,
                actual
            )));
        }

        Ok(())
    }

    /// Return the bytes of the object under `key`.
    pub fn get(&self, key: &str) -> Result<Vec<u8>> {
        let request = Request {
            method: Method::GET,
            url: self.url(key, &[]),
            headers: vec![body_digest(&[])],
            body: Vec::new(),
        };
        let response = self.service.send(request)?;
        let data = response
            .bytes()
            .map_err(|error| Error::Store(anyhow::Error::new(error)))?;
        Ok(data.to_vec())
    }

    /// List the keys under `prefix`, grouping deeper keys by `delimiter`
    /// when one is given.
    pub fn list(&self, prefix: &str, delimiter: &str) -> Result<ListResult> {
        let mut query = vec![("prefix", prefix)];
        if !delimiter.is_empty() {
            query.push(("delimiter", delimiter));
        }
        let request = Request {
            method: Method::GET,
            url: self.url("", &query),
            headers: vec![body_digest(&[])],
            body: Vec::new(),
        };
        let response = self.service.send(request)?;
        let document = response
            .text()
            .map_err(|error| Error::Store(anyhow::Error::new(error)))?;
        Ok(ListResult::from_document(&document))
    }

    /// Delete the given `keys` in one batch request.
    ///
    /// Returns the per-key failures reported by the service; an empty list
    /// means every key was deleted.
    pub fn delete(&self, keys: &[String]) -> Result<Vec<DeleteError>> {
        let mut document = String::from("<Delete>");
        for key in keys {
            document.push_str("<Object><Key>");
            document.push_str(&xml::escape(key));
            document.push_str("</Key></Object>");
        }
        document.push_str("</Delete>");
        let body = document.into_bytes();

        let request = Request {
            method: Method::POST,
            url: self.url("", &[("delete", "")]),
            headers: vec![
                ("Content-MD5".to_owned(), BASE64.encode(Md5::digest(&body))),
                body_digest(&body),
            ],
            body,
        };
        let response = self.service.send(request)?;
        let document = response
            .text()
            .map_err(|error| Error::Store(anyhow::Error::new(error)))?;

        Ok(xml::elements(&document, "Error")
            .iter()
            .map(|error| DeleteError {
                key: xml::text(error, "Key").unwrap_or_default(),
                code: xml::text(error, "Code").unwrap_or_default(),
                message: xml::text(error, "Message").unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_listing_documents() {
        let document = "\
            <?xml version=\"1.0\" encoding=\"UTF-8\"?>\
            <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
            <Name>bucket</Name>\
            <Prefix>backups/</Prefix>\
            <IsTruncated>false</IsTruncated>\
            <Contents><Key>backups/meta</Key></Contents>\
            <Contents><Key>backups/00000</Key></Contents>\
            <CommonPrefixes><Prefix>backups/nightly/</Prefix></CommonPrefixes>\
            </ListBucketResult>";

        let result = ListResult::from_document(document);
        assert!(!result.is_truncated);
        assert_eq!(result.contents, vec!["backups/meta", "backups/00000"]);
        assert_eq!(result.common_prefixes, vec!["backups/nightly/"]);
    }

    #[test]
    fn parses_error_documents() {
        let document = "\
            <?xml version=\"1.0\" encoding=\"UTF-8\"?>\
            <Error>\
            <Code>NoSuchKey</Code>\
            <Message>The specified key does not exist.</Message>\
            <RequestId>ABC123</RequestId>\
            </Error>";

        let error = ServiceError::from_document(document, StatusCode::NOT_FOUND);
        assert_eq!(error.code, "NoSuchKey");
        assert_eq!(error.message, "The specified key does not exist.");
        assert_eq!(error.request_id, "ABC123");
        assert!(classify(error).is_not_found());
    }

    #[test]
    fn falls_back_to_the_status_code() {
        let error = ServiceError::from_document("", StatusCode::BAD_GATEWAY);
        assert_eq!(error.code, "HTTP 502");
        assert!(classify(error).is_recoverable());
    }
}
