//! Images unpacked from an archive result, with a user selection.

use crate::blobs::{BlobStore, BlobUrl};
use crate::error::ToolkitError;
use crate::pipeline::archive::{package_archive, ArchiveEntry};
use crate::pipeline::encode::sniff;
use std::collections::BTreeSet;
use std::sync::Arc;

/// One extracted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    pub name: String,
    pub url: BlobUrl,
    pub bytes: Arc<[u8]>,
}

/// Ordered images plus the indices currently selected.
///
/// The selection is always a subset of `0..len()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedImageSet {
    images: Vec<ExtractedImage>,
    selected: BTreeSet<usize>,
}

impl ExtractedImageSet {
    /// Register each entry in `store`. Nothing is selected initially.
    pub fn from_entries(store: &BlobStore, entries: Vec<ArchiveEntry>) -> Self {
        let images = entries
            .into_iter()
            .map(|e| {
                let bytes: Arc<[u8]> = e.bytes.into();
                let url = store.create(Arc::clone(&bytes), sniff(&bytes).mime_type());
                ExtractedImage {
                    name: e.name,
                    url,
                    bytes,
                }
            })
            .collect();
        Self {
            images,
            selected: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[ExtractedImage] {
        &self.images
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Flip the selection of `index`. Out-of-range indices are ignored and
    /// return `false`.
    pub fn toggle(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            return false;
        }
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
        true
    }

    pub fn select_all(&mut self) {
        self.selected = (0..self.images.len()).collect();
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    /// Selected images, in entry order.
    pub fn selected(&self) -> Vec<&ExtractedImage> {
        self.selected.iter().map(|&i| &self.images[i]).collect()
    }

    /// Zip the selected images.
    pub fn package_selected(&self) -> Result<Vec<u8>, ToolkitError> {
        if self.selected.is_empty() {
            return Err(ToolkitError::Validation("No images selected.".into()));
        }
        let entries: Vec<_> = self
            .selected()
            .into_iter()
            .map(|img| ArchiveEntry::new(img.name.clone(), img.bytes.to_vec()))
            .collect();
        package_archive(&entries)
    }

    /// Revoke every image URL.
    pub fn release(&self, store: &BlobStore) {
        store.revoke_all(self.images.iter().map(|i| &i.url));
    }
}
