//! Pre-parsed program images ready to be loaded into target memory.
//!
//! Parsing ELF or other container formats is out of scope for this crate;
//! whatever front end drives the bridge hands over plain
//! (load address, bytes, entry point) triples.

use std::ops::Range;

/// A single contiguous image to be written to target memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    /// Address the first byte of `data` is loaded to.
    pub load_address: u64,
    /// The raw bytes of the image.
    pub data: Vec<u8>,
    /// Entry point to start execution at, if this image carries one.
    pub entry_point: Option<u64>,
}

impl BinaryImage {
    /// Creates an image without an entry point.
    pub fn new(load_address: u64, data: Vec<u8>) -> Self {
        Self {
            load_address,
            data,
            entry_point: None,
        }
    }

    /// Sets the entry point of this image.
    pub fn with_entry_point(mut self, entry_point: u64) -> Self {
        self.entry_point = Some(entry_point);
        self
    }

    /// The address range this image occupies in target memory, or `None`
    /// when the image would extend past the top of the address space.
    pub fn address_range(&self) -> Option<Range<u64>> {
        let end = self.load_address.checked_add(self.data.len() as u64)?;
        Some(self.load_address..end)
    }
}

/// An ordered set of images making up one program.
///
/// The order is preserved; images are loaded front to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinarySet {
    images: Vec<BinaryImage>,
}

impl BinarySet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an image to the set.
    pub fn push(&mut self, image: BinaryImage) {
        self.images.push(image);
    }

    /// Iterates over the images in load order.
    pub fn iter(&self) -> impl Iterator<Item = &BinaryImage> {
        self.images.iter()
    }

    /// Number of images in the set.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the set contains no images.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// The entry point of the program, taken from the first image that
    /// declares one.
    pub fn entry_point(&self) -> Option<u64> {
        self.images.iter().find_map(|image| image.entry_point)
    }
}

impl From<Vec<BinaryImage>> for BinarySet {
    fn from(images: Vec<BinaryImage>) -> Self {
        Self { images }
    }
}

impl FromIterator<BinaryImage> for BinarySet {
    fn from_iter<I: IntoIterator<Item = BinaryImage>>(iter: I) -> Self {
        Self {
            images: iter.into_iter().collect(),
        }
    }
}
