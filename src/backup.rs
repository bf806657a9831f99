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

//! Driving an external archiver through the chunk stream.
//!
//! A backup is the output of `tar` streamed through a [`ChunkWriter`] into a
//! store; restoring feeds a [`ChunkReader`] back into `tar`. Compression is
//! delegated to the archiver.
//!
//! [`ChunkWriter`]: crate::stream::ChunkWriter
//! [`ChunkReader`]: crate::stream::ChunkReader

use std::fs::DirBuilder;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use crate::store::ObjectStore;
use crate::stream::{ChunkReader, ChunkWriter};
use crate::{Error, Result};

/// Unwrap a `std::io` error produced while copying through a chunk stream,
/// recovering the store error it carries when there is one.
fn stream_error(error: io::Error) -> Error {
    let is_ours = error
        .get_ref()
        .map_or(false, |inner| inner.is::<Error>());
    if is_ours {
        let inner = error
            .into_inner()
            .expect("io::Error with an inner error lost it.");
        return *inner
            .downcast::<Error>()
            .expect("inner error changed type.");
    }
    Error::Io(error)
}

/// Describe an archiver failure by its exit status and the first line it
/// printed to stderr.
fn archiver_error(stderr: &[u8], status: ExitStatus) -> Error {
    let stderr = String::from_utf8_lossy(stderr);
    let detail = stderr.lines().next().unwrap_or("").trim();
    if detail.is_empty() {
        Error::Archiver(status.to_string())
    } else {
        Error::Archiver(format!("{}: {}", status, detail))
    }
}

/// Archive `paths` into `store` as one backup.
///
/// Runs `tar -c -z -p`, changing to `source` first when one is given, and
/// streams its output through a [`ChunkWriter`] storing chunks of
/// `chunk_size` bytes. Returns the number of archive bytes stored.
///
/// # Errors
/// - `Error::Archiver`: The archiver exited unsuccessfully.
/// - Any error from the underlying store.
///
/// [`ChunkWriter`]: crate::stream::ChunkWriter
pub fn create(
    store: Box<dyn ObjectStore>,
    chunk_size: usize,
    source: Option<&Path>,
    paths: &[String],
) -> Result<u64> {
    let mut command = Command::new("tar");
    command.arg("-c").arg("-z").arg("-p");
    if let Some(directory) = source {
        command.arg("-C").arg(directory);
    }
    command.args(paths);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let mut stdout = child.stdout.take().expect("stdout is piped.");

    let mut writer = ChunkWriter::new(store, chunk_size);
    let copied = io::copy(&mut stdout, &mut writer);
    drop(stdout);
    let output = child.wait_with_output()?;

    if let Err(error) = copied {
        return Err(stream_error(error));
    }
    if !output.status.success() {
        return Err(archiver_error(&output.stderr, output.status));
    }

    writer.close()?;

    Ok(writer.size())
}

/// Restore the backup in `store` into a new directory at `dest`.
///
/// The directory is created, accessible only to the owner, and must not
/// exist yet. The archive is fed to `tar -x -z` through a [`ChunkReader`].
/// Returns the number of archive bytes read.
///
/// # Errors
/// - `Error::Archiver`: The archiver exited unsuccessfully.
/// - Any error from the underlying store, including `Error::Integrity` for
/// a corrupted chunk.
///
/// [`ChunkReader`]: crate::stream::ChunkReader
pub fn restore(store: Box<dyn ObjectStore>, dest: &Path) -> Result<u64> {
    let mut reader = ChunkReader::new(store)?;

    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dest)?;

    let mut command = Command::new("tar");
    command
        .arg("-x")
        .arg("-z")
        .arg("-f")
        .arg("-")
        .arg("-C")
        .arg(dest);
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn()?;
    let mut stdin = child.stdin.take().expect("stdin is piped.");

    let copied = io::copy(&mut reader, &mut stdin);
    drop(stdin);
    let output = child.wait_with_output()?;

    // A broken pipe means the archiver stopped reading; its own failure is
    // the interesting error then.
    match copied {
        Err(error) if error.kind() != io::ErrorKind::BrokenPipe => {
            return Err(stream_error(error))
        }
        _ => {}
    }
    if !output.status.success() {
        return Err(archiver_error(&output.stderr, output.status));
    }

    Ok(reader.size())
}
