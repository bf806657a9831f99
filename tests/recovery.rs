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
use std::time::Duration;

use strongbox::store::{MemoryStore, ObjectStore, RecoverableStore};
use strongbox::Error;

use common::{random_buffer, FlakyStore, ScriptedPrompt};

mod common;

fn transient() -> Error {
    Error::Store(anyhow::anyhow!("injected transient failure"))
}

fn not_found() -> Error {
    Error::NotFound
}

fn authentication() -> Error {
    Error::Authentication
}

/// Wrap a flaky store in a recovery layer that never sleeps.
fn recoverable_over(
    failures: usize,
    error: fn() -> Error,
    prompt: &Arc<ScriptedPrompt>,
) -> (RecoverableStore, Arc<std::sync::atomic::AtomicUsize>) {
    let flaky = FlakyStore::new(MemoryStore::new(), failures, error);
    let attempts = flaky.attempt_counter();
    let store = RecoverableStore::with_delay(
        Box::new(flaky),
        Arc::clone(prompt) as Arc<dyn strongbox::store::Prompt>,
        Duration::ZERO,
    );
    (store, attempts)
}

#[test]
fn one_transient_failure_is_retried_silently() -> anyhow::Result<()> {
    let prompt = ScriptedPrompt::new(&[]);
    let (store, attempts) = recoverable_over(1, transient, &prompt);
    let data = random_buffer();

    store.put("key", &data)?;
    assert_eq!(store.get("key")?, data);

    // One failed attempt, one automatic retry, and no operator involvement.
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(prompt.reports(), 1);
    assert_eq!(prompt.questions(), 0);

    Ok(())
}

#[test]
fn a_persistent_failure_escalates_to_the_operator() {
    let prompt = ScriptedPrompt::new(&[]);
    let (store, attempts) = recoverable_over(usize::MAX, transient, &prompt);

    let error = store.put("key", &random_buffer()).unwrap_err();

    // Initial attempt plus one automatic retry, then the declined prompt
    // surfaces the failure wrapped with the operation and key.
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(prompt.reports(), 1);
    assert_eq!(prompt.questions(), 1);
    match error {
        Error::Failed {
            operation, key, ..
        } => {
            assert_eq!(operation, "put");
            assert_eq!(key, "key");
        }
        other => panic!("expected Error::Failed, got {:?}", other),
    }
}

#[test]
fn an_affirmative_answer_starts_another_cycle() -> anyhow::Result<()> {
    let prompt = ScriptedPrompt::new(&[true]);
    let (store, attempts) = recoverable_over(3, transient, &prompt);
    let data = random_buffer();

    // Fail, fail, prompt(yes), fail, succeed on the automatic retry.
    store.put("key", &data)?;

    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 4);
    assert_eq!(prompt.reports(), 2);
    assert_eq!(prompt.questions(), 1);

    Ok(())
}

#[test]
fn missing_keys_are_never_retried() {
    let prompt = ScriptedPrompt::new(&[]);
    let (store, attempts) = recoverable_over(usize::MAX, not_found, &prompt);

    let error = store.get("nonexistent").unwrap_err();

    assert!(error.is_not_found());
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(prompt.reports(), 0);
    assert_eq!(prompt.questions(), 0);
}

#[test]
fn authentication_failures_are_never_retried() {
    let prompt = ScriptedPrompt::new(&[]);
    let (store, attempts) = recoverable_over(usize::MAX, authentication, &prompt);

    let error = store.get("key").unwrap_err();

    assert!(matches!(error, Error::Authentication));
    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(prompt.reports(), 0);
    assert_eq!(prompt.questions(), 0);
}

#[test]
fn list_and_destroy_are_not_retried() -> anyhow::Result<()> {
    let prompt = ScriptedPrompt::new(&[]);
    let (store, _attempts) = recoverable_over(0, transient, &prompt);

    store.put("key", &random_buffer())?;
    let listing = store.list()?;
    assert_eq!(listing.keys, vec!["key"]);
    store.destroy()?;

    assert_eq!(prompt.reports(), 0);
    assert_eq!(prompt.questions(), 0);

    Ok(())
}

#[test]
fn descended_stores_keep_the_retry_policy() -> anyhow::Result<()> {
    let prompt = ScriptedPrompt::new(&[]);
    let (store, attempts) = recoverable_over(1, transient, &prompt);
    let data = random_buffer();

    let child = store.descend("nested")?;
    child.put("key", &data)?;
    assert_eq!(child.get("key")?, data);

    assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert_eq!(prompt.reports(), 1);

    Ok(())
}
