//! Module image registry
//!
//! An [`Image`] is a snapshot of one loaded module: base address, size, and
//! the bytes that were read from the target at the last refresh. The
//! registry is rebuilt wholesale on every refresh; there is no incremental
//! update and no merging with prior state.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::{GraftError, Result};
use crate::target::TargetProcess;

/// snapshot record for one loaded module
#[derive(Debug, Clone)]
pub struct Image {
    base: usize,
    size: usize,
    bytes: Vec<u8>,
}

impl Image {
    /// module base address at snapshot time
    pub fn base(&self) -> usize {
        self.base
    }

    /// module size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// bytes captured at the last refresh; length equals [`Image::size`]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// map from module name to its last snapshot
///
/// duplicate module names in enumeration order collapse to the first
/// occurrence; later entries with the same name are skipped.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    images: HashMap<String, Image>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// rebuild the registry from the target's current module list
    ///
    /// a snapshot failure leaves the existing map untouched. once a snapshot
    /// succeeds the old map is discarded before iteration begins, so a refresh
    /// that fails to populate some images still replaces the prior state.
    /// an image whose bytes cannot be read in full is dropped rather than
    /// kept stale; per-image read failures do not fail the refresh.
    pub fn refresh<T: TargetProcess>(&mut self, target: &T) -> Result<()> {
        let entries = target.modules()?;

        self.images.clear();

        for entry in entries {
            if self.images.contains_key(&entry.name) {
                continue;
            }

            let mut bytes = vec![0u8; entry.size];
            if let Err(err) = target.read(entry.base, &mut bytes) {
                warn!("dropping image {}: {}", entry.name, err);
                continue;
            }

            self.images.insert(
                entry.name,
                Image {
                    base: entry.base,
                    size: entry.size,
                    bytes,
                },
            );
        }

        debug!("image registry refreshed: {} images", self.images.len());
        Ok(())
    }

    /// re-read a tracked image's current bytes into `dest`
    ///
    /// `dest` is resized to the image's recorded size before the read, so on
    /// failure its prior contents are gone but its length is well defined.
    pub fn read_image<T: TargetProcess>(
        &self,
        target: &T,
        name: &str,
        dest: &mut Vec<u8>,
    ) -> Result<()> {
        let image = self.images.get(name).ok_or_else(|| GraftError::ImageNotFound {
            name: name.to_string(),
        })?;

        dest.clear();
        dest.resize(image.size, 0);
        target.read(image.base, dest)
    }

    /// look up a tracked image by module name
    pub fn get(&self, name: &str) -> Option<&Image> {
        self.images.get(name)
    }

    /// whether a module name is tracked
    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    /// number of tracked images
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// iterate over tracked module names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    /// drop all tracked images
    pub fn clear(&mut self) {
        self.images.clear();
    }
}
