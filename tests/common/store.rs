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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use strongbox::key::SecretKey;
use strongbox::store::{
    EncryptedStore, Listing, MemoryStore, ObjectStore, Prompt, RecoverableStore,
};
use strongbox::{Error, Result};

/// Return a fresh secret key for testing.
pub fn test_key() -> Arc<SecretKey> {
    strongbox::init();
    Arc::new(SecretKey::generate())
}

/// Wrap `store` in an encryption layer with a fresh key.
pub fn encrypted(store: impl ObjectStore + 'static) -> Box<dyn ObjectStore> {
    Box::new(EncryptedStore::new(Box::new(store), test_key()))
}

/// Wrap `store` in a recovery layer which never sleeps and whose prompt
/// always declines.
pub fn recoverable(store: impl ObjectStore + 'static) -> Box<dyn ObjectStore> {
    Box::new(RecoverableStore::with_delay(
        Box::new(store),
        ScriptedPrompt::new(&[]),
        Duration::ZERO,
    ))
}

/// A `Prompt` which answers retry questions from a script and counts what it
/// is asked.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<Vec<bool>>,
    reports: AtomicUsize,
    questions: AtomicUsize,
}

impl ScriptedPrompt {
    /// Create a prompt which gives `answers` in order, then declines.
    pub fn new(answers: &[bool]) -> Arc<Self> {
        let mut scripted: Vec<bool> = answers.to_vec();
        scripted.reverse();
        Arc::new(ScriptedPrompt {
            answers: Mutex::new(scripted),
            reports: AtomicUsize::new(0),
            questions: AtomicUsize::new(0),
        })
    }

    /// The number of failures reported before automatic retries.
    pub fn reports(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }

    /// The number of retry questions asked.
    pub fn questions(&self) -> usize {
        self.questions.load(Ordering::SeqCst)
    }
}

impl Prompt for ScriptedPrompt {
    fn report(&self, _message: &str) {
        self.reports.fetch_add(1, Ordering::SeqCst);
    }

    fn ask_retry(&self, _message: &str) -> bool {
        self.questions.fetch_add(1, Ordering::SeqCst);
        self.answers.lock().unwrap().pop().unwrap_or(false)
    }
}

/// An `ObjectStore` which injects a scripted number of failures into `put`
/// and `get` before delegating to a wrapped store.
#[derive(Debug)]
pub struct FlakyStore {
    inner: Box<dyn ObjectStore>,
    failures: Arc<AtomicUsize>,
    error: fn() -> Error,
    attempts: Arc<AtomicUsize>,
}

impl FlakyStore {
    /// Wrap `inner`, failing the next `failures` operations with `error`.
    pub fn new(inner: MemoryStore, failures: usize, error: fn() -> Error) -> Self {
        FlakyStore {
            inner: Box::new(inner),
            failures: Arc::new(AtomicUsize::new(failures)),
            error,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The number of `put` and `get` attempts made so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Share the attempt counter so it outlives the store.
    pub fn attempt_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }

    fn inject(&self) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if injected {
            Err((self.error)())
        } else {
            Ok(())
        }
    }
}

impl ObjectStore for FlakyStore {
    fn abs(&self, key: &str) -> String {
        self.inner.abs(key)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.inject()?;
        self.inner.put(key, data)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.inject()?;
        self.inner.get(key)
    }

    fn list(&self) -> Result<Listing> {
        self.inner.list()
    }

    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>> {
        Ok(Box::new(FlakyStore {
            inner: self.inner.descend(child)?,
            failures: Arc::clone(&self.failures),
            error: self.error,
            attempts: Arc::clone(&self.attempts),
        }))
    }

    fn destroy(&self) -> Result<()> {
        self.inner.destroy()
    }
}
