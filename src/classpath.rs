//! Directory-backed class lookup for superclass resolution

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::classfile::ClassFile;
use crate::engine::ClassHierarchy;
use crate::error::{Error, Result};

/// Resolves internal class names against a list of class directories, first match wins.
/// Parsed classes (and misses) are cached.
#[derive(Debug, Default)]
pub struct ClassPath {
    roots: Vec<PathBuf>,
    cache: Mutex<HashMap<String, Option<Arc<ClassFile>>>>,
}

impl ClassPath {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self { roots: roots.into_iter().map(Into::into).collect(), cache: Mutex::new(HashMap::new()) }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// File that would hold `name`, e.g. `com/x/Base` -> `<root>/com/x/Base.class`
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.roots.iter().map(|root| class_file_path(root, name)).find(|path| path.is_file())
    }

    /// Load and parse `name`; `Ok(None)` when no root holds it
    pub fn load(&self, name: &str) -> Result<Option<Arc<ClassFile>>> {
        if let Some(cached) = self.lock_cache().get(name) {
            return Ok(cached.clone());
        }
        let loaded = match self.resolve(name) {
            Some(path) => {
                let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
                let class = ClassFile::parse(&bytes).map_err(|e| Error::malformed(path.display().to_string(), e))?;
                Some(Arc::new(class))
            }
            None => None,
        };
        self.lock_cache().insert(name.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// Seed the cache with an already parsed class
    pub fn insert(&self, class: Arc<ClassFile>) -> Result<()> {
        let name = class.name().map_err(|e| Error::malformed("<unnamed>", e))?.to_string();
        self.lock_cache().insert(name, Some(class));
        Ok(())
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<Arc<ClassFile>>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ClassHierarchy for ClassPath {
    fn lookup(&self, name: &str) -> Option<Arc<ClassFile>> {
        match self.load(name) {
            Ok(class) => class,
            Err(e) => {
                log::warn!("Could not load {} from the class path: {}", name, e);
                None
            }
        }
    }
}

fn class_file_path(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(name.split('/'));
    path.set_extension("class");
    path
}
