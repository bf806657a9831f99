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
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::object_store::{Listing, ObjectStore};
use crate::{Error, Result};

/// One level of the in-memory namespace tree.
#[derive(Debug, Default)]
struct Node {
    objects: BTreeMap<String, Vec<u8>>,
    children: BTreeMap<String, Node>,
}

impl Node {
    /// Return the node at `path`, or `None` if any segment is missing.
    fn find(&self, path: &[String]) -> Option<&Node> {
        let mut node = self;
        for segment in path {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    /// Return the node at `path`, or `None` if any segment is missing.
    fn find_mut(&mut self, path: &[String]) -> Option<&mut Node> {
        let mut node = self;
        for segment in path {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    /// Return the node at `path`, creating any missing segments.
    fn find_or_create(&mut self, path: &[String]) -> &mut Node {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.clone()).or_default();
        }
        node
    }
}

/// An `ObjectStore` which stores objects in memory.
///
/// Unlike other stores, data in a `MemoryStore` is not stored persistently
/// and is only accessible to the current process. This store is useful for
/// testing.
///
/// Cloning a `MemoryStore` returns a handle to the same namespace tree, as
/// does descending, so values written through one handle are visible through
/// the others.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: Arc<Mutex<Node>>,
    path: Vec<String>,
}

impl MemoryStore {
    /// Create a new empty `MemoryStore`.
    pub fn new() -> Self {
        MemoryStore {
            root: Arc::new(Mutex::new(Node::default())),
            path: Vec::new(),
        }
    }

    /// Split `key` into the path of the namespace it lives in and its final
    /// segment, relative to this store's position in the tree.
    fn resolve(&self, key: &str) -> (Vec<String>, String) {
        let mut path = self.path.clone();
        let mut segments: Vec<&str> = key.split('/').collect();
        let leaf = segments.pop().unwrap_or_default().to_owned();
        path.extend(segments.into_iter().map(String::from));
        (path, leaf)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl ObjectStore for MemoryStore {
    fn abs(&self, key: &str) -> String {
        let mut segments = self.path.clone();
        segments.push(key.to_owned());
        format!("memory://{}", segments.join("/"))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let (path, leaf) = self.resolve(key);
        let mut root = self.root.lock().unwrap();
        root.find_or_create(&path).objects.insert(leaf, data.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let (path, leaf) = self.resolve(key);
        let root = self.root.lock().unwrap();
        root.find(&path)
            .and_then(|node| node.objects.get(&leaf))
            .cloned()
            .ok_or(Error::NotFound)
    }

    fn list(&self) -> Result<Listing> {
        let root = self.root.lock().unwrap();
        Ok(match root.find(&self.path) {
            Some(node) => Listing {
                keys: node.objects.keys().cloned().collect(),
                children: node.children.keys().cloned().collect(),
            },
            None => Listing::default(),
        })
    }

    fn descend(&self, child: &str) -> Result<Box<dyn ObjectStore>> {
        let mut path = self.path.clone();
        path.extend(child.split('/').map(String::from));
        Ok(Box::new(MemoryStore {
            root: Arc::clone(&self.root),
            path,
        }))
    }

    fn destroy(&self) -> Result<()> {
        let mut root = self.root.lock().unwrap();
        match self.path.split_last() {
            Some((name, parent)) => {
                if let Some(node) = root.find_mut(parent) {
                    node.children.remove(name);
                }
            }
            None => *root = Node::default(),
        }
        Ok(())
    }
}
