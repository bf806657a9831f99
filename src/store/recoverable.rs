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
use std::fmt::{self, Debug, Formatter};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::warn;

use super::object_store::{Listing, ObjectStore};
use crate::{Error, Result};

/// The default wait between a failed operation and its automatic retry.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// How failures and retry questions reach the operator.
///
/// [`RecoverableStore`] reports each failure it is about to retry and, when a
/// failure persists, asks whether to keep going. Implementations other than
/// [`ConsolePrompt`] exist so tests can script the operator's answers.
///
/// [`RecoverableStore`]: crate::store::RecoverableStore
/// [`ConsolePrompt`]: crate::store::ConsolePrompt
pub trait Prompt: Send + Sync {
    /// Report a failure which will be retried automatically.
    fn report(&self, message: &str);

    /// Ask the operator whether to keep retrying after `message`.
    ///
    /// Returns `true` only on explicit affirmation.
    fn ask_retry(&self, message: &str) -> bool;
}

/// A `Prompt` which reports through the logger and asks questions on the
/// controlling terminal.
///
/// A single lock covers each print-and-read, so questions from concurrent
/// operations are never interleaved. Asking blocks the calling thread until
/// the operator answers.
#[derive(Debug, Default)]
pub struct ConsolePrompt {
    lock: Mutex<()>,
}

impl ConsolePrompt {
    /// Create a new `ConsolePrompt`.
    pub fn new() -> Self {
        ConsolePrompt::default()
    }
}

impl Prompt for ConsolePrompt {
    fn report(&self, message: &str) {
        let _guard = self.lock.lock().unwrap();
        warn!("{}", message);
    }

    fn ask_retry(&self, message: &str) -> bool {
        let _guard = self.lock.lock().unwrap();
        warn!("{}", message);

        eprint!("--> Retry? [y/N]: ");
        let _ = io::stderr().flush();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().chars().next(), Some('y') | Some('Y'))
    }
}

/// An `ObjectStore` which retries failed operations.
///
/// [`put`] and [`get`] are retried: a failed attempt is reported and retried
/// automatically once after a fixed delay, silently; if the failure persists,
/// the operator is asked whether to start another cycle. Declining surfaces
/// the error wrapped with the operation name and key. Errors for which
/// [`Error::is_recoverable`] is false (missing keys, failed authentication
/// or integrity checks) are surfaced immediately without any retry.
///
/// [`list`], [`descend`], and [`destroy`] are not retried.
///
/// [`put`]: crate::store::ObjectStore::put
/// [`get`]: crate::store::ObjectStore::get
/// [`list`]: crate::store::ObjectStore::list
/// [`descend`]: crate::store::ObjectStore::descend
/// [`destroy`]: crate::store::ObjectStore::destroy
/// [`Error::is_recoverable`]: crate::Error::is_recoverable
pub struct RecoverableStore {
    inner: Box<dyn ObjectStore>,
    prompt: Arc<dyn Prompt>,
    delay: Duration,
}

impl Debug for RecoverableStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableStore {{ inner: {:?} }}", self.inner)
    }
}

impl RecoverableStore {
    /// Wrap `inner`, reporting and asking through `prompt`.
    pub fn new(inner: Box<dyn ObjectStore>, prompt: Arc<dyn Prompt>) -> Self {
        RecoverableStore::with_delay(inner, prompt, RETRY_DELAY)
    }

    /// Like [`new`], but waiting `delay` before each automatic retry.
    ///
    /// [`new`]: crate::store::RecoverableStore::new
    pub fn with_delay(inner: Box<dyn ObjectStore>, prompt: Arc<dyn Prompt>, delay: Duration) -> Self {
        RecoverableStore {
            inner,
            prompt,
            delay,
        }
    }

    /// Run `attempt` through the retry state machine.
    fn recover<T>(
        &self,
        operation: &'static str,
        key: &str,
        mut attempt: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_recoverable() => return Err(error),
                Err(error) => {
                    self.prompt.report(&format!(
                        "{}({:?}) failed: {}\n... Retrying in {} seconds.",
                        operation,
                        key,
                        error,
                        self.delay.as_secs()
                    ));
                    thread::sleep(self.delay);
                }
            }

            match attempt() {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_recoverable() => return Err(error),
                Err(error) => {
                    let message = format!("{}({:?}) failed: {}", operation, key, error);
                    if !self.prompt.ask_retry(&message) {
                        return Err(Error::Failed {
                            operation,
                            key: key.to_owned(),
                            source: Box::new(error),
                        });
                    }
                }
            }
        }
    }
}

impl ObjectStore for RecoverableStore {
    fn abs(&self, key: &str) -> String {
        self.inner.abs(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.recover("put", key, || self.inner.put(key, data))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.recover("get", key, || self.inner.get(key))
    }

    fn list(&self) -> Result<Listing> {
        self.inner.list()
    }

    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>> {
        Ok(Box::new(RecoverableStore {
            inner: self.inner.descend(child)?,
            prompt: Arc::clone(&self.prompt),
            delay: self.delay,
        }))
    }

    fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}
