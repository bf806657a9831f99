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
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use log::{error, info};

use strongbox::key::{self, SecretKey};
use strongbox::store::{
    ConsolePrompt, DirectoryStore, EncryptedStore, ObjectStore, RecoverableStore, S3Store,
};
use strongbox::stream::DEFAULT_CHUNK_SIZE;
use strongbox::{backup, Error};

#[derive(Parser)]
#[command(
    name = "strongbox",
    version,
    about = "Encrypted, chunked backups to local or remote object storage."
)]
struct Args {
    /// Bucket locator: a local directory, or a JSON file describing a remote
    /// bucket.
    #[arg(short, long, value_name = "LOCATOR")]
    bucket: Option<PathBuf>,

    /// Key file used to encrypt and authenticate stored data.
    #[arg(short, long, value_name = "FILE")]
    key: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the backups stored in the bucket.
    List,

    /// Archive paths into a named backup.
    Put {
        /// The name of the backup to create.
        name: String,

        /// Change to this directory before archiving.
        #[arg(short = 'C', long, value_name = "DIR")]
        directory: Option<PathBuf>,

        /// The paths to archive.
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Restore a named backup into a new directory.
    Get {
        /// The name of the backup to restore.
        name: String,

        /// The directory to restore into. It must not exist yet.
        dest: PathBuf,
    },

    /// Delete named backups after confirmation.
    Delete {
        /// The names of the backups to delete.
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Create a key file, or change the passphrase of an existing one.
    Keygen,
}

fn main() -> ExitCode {
    env_logger::builder().format_timestamp(None).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> strongbox::Result<()> {
    strongbox::init();

    match &args.command {
        Command::Keygen => {
            let path = args
                .key
                .as_deref()
                .ok_or_else(|| Error::Store(anyhow!("keygen requires --key")))?;
            return keygen(path);
        }
        Command::List => {
            let store = open_store(&args)?;
            let listing = store.list()?;
            for child in listing.children {
                println!("{}", child);
            }
        }
        Command::Put {
            name,
            directory,
            paths,
        } => {
            let store = open_store(&args)?;
            let stored = backup::create(
                store.descend(name)?,
                DEFAULT_CHUNK_SIZE,
                directory.as_deref(),
                paths,
            )?;
            info!("put {:?}: {} bytes stored", name, stored);
        }
        Command::Get { name, dest } => {
            let store = open_store(&args)?;
            let read = backup::restore(store.descend(name)?, dest)?;
            info!("get {:?}: {} bytes read", name, read);
        }
        Command::Delete { names } => {
            let store = open_store(&args)?;
            delete(&store, names)?;
        }
    }

    Ok(())
}

/// Open the backend selected by the bucket locator and wrap it with the
/// configured decorators.
fn open_store(args: &Args) -> strongbox::Result<Box<dyn ObjectStore>> {
    let locator = args
        .bucket
        .as_deref()
        .ok_or_else(|| Error::Store(anyhow!("this command requires --bucket")))?;

    let backend: Box<dyn ObjectStore> = if locator.is_dir() {
        Box::new(DirectoryStore::new(locator))
    } else if locator.is_file() {
        Box::new(S3Store::from_file(locator)?)
    } else {
        return Err(Error::Store(anyhow!("no such bucket locator: {:?}", locator)));
    };

    let store: Box<dyn ObjectStore> = match &args.key {
        Some(path) => {
            let key = Arc::new(load_key(path)?);
            Box::new(EncryptedStore::new(backend, key))
        }
        None => backend,
    };

    Ok(Box::new(RecoverableStore::new(
        store,
        Arc::new(ConsolePrompt::new()),
    )))
}

/// Load the secret key from `path`, asking for its passphrase.
fn load_key(path: &Path) -> strongbox::Result<SecretKey> {
    let passphrase = read_line(&format!("Passphrase for {}: ", path.display()))?;
    key::load(path, &passphrase)
}

/// Create a key file at `path`, or re-wrap an existing one under a new
/// passphrase.
fn keygen(path: &Path) -> strongbox::Result<()> {
    let (key, created) = if path.exists() {
        eprintln!("Updating passphrase for key file: {}", path.display());
        (load_key(path)?, false)
    } else {
        eprintln!("Creating new key file: {}", path.display());
        (SecretKey::generate(), true)
    };

    let passphrase = read_line("New passphrase: ")?;
    let confirmed = read_line("Confirm passphrase: ")?;
    if passphrase != confirmed {
        return Err(Error::Store(anyhow!("passphrases do not match")));
    }

    key::save(&key, path, &passphrase)?;

    if created {
        eprintln!("Key file created successfully: {}", path.display());
        eprintln!("You should now back up your key file and store it somewhere safe!");
    } else {
        eprintln!("Passphrase updated successfully: {}", path.display());
    }

    Ok(())
}

/// Delete the named backups beneath `store`, confirming each one with the
/// operator first.
fn delete(store: &dyn ObjectStore, names: &[String]) -> strongbox::Result<()> {
    let listing = store.list()?;

    for name in names {
        if !listing.children.iter().any(|child| child == name) {
            println!("{:?} not found. Skipping.", name);
            continue;
        }

        let child = store.descend(name)?;
        let contents = child.list()?;

        println!("\nGoing to delete {:?}:", name);
        for entry in summary(&contents.keys) {
            println!("   {}", entry);
        }
        for entry in summary(&contents.children) {
            println!("   {}", entry);
        }

        if !confirm("Continue? [y/N]: ")? {
            println!("Delete cancelled!");
            return Ok(());
        }

        child.destroy()?;
        println!("Deleted {:?}", name);
    }

    Ok(())
}

/// Abbreviate a long listing to its first and last few entries.
fn summary(entries: &[String]) -> Vec<String> {
    if entries.len() <= 6 {
        return entries.to_vec();
    }
    let mut abbreviated = entries[..3].to_vec();
    abbreviated.push("...".to_owned());
    abbreviated.extend_from_slice(&entries[entries.len() - 3..]);
    abbreviated
}

/// Ask a yes/no question; only an explicit `y` is an affirmation.
fn confirm(prompt: &str) -> strongbox::Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().chars().next(), Some('y') | Some('Y')))
}

/// Print `prompt` and read one line from standard input.
fn read_line(prompt: &str) -> strongbox::Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
