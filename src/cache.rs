use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use image::RgbaImage;
use rayon::prelude::*;

const FINGERPRINT_CHUNK: usize = 1 << 20;

/// Content fingerprint of a source image: dimensions plus every sample.
/// Large buffers are hashed in parallel chunks and the chunk digests folded
/// in order, so the value only depends on content.
pub fn fingerprint(image: &RgbaImage) -> u64 {
    let chunk_digests: Vec<u64> = image
        .as_raw()
        .par_chunks(FINGERPRINT_CHUNK)
        .map(|chunk| {
            let mut hasher = DefaultHasher::new();
            chunk.hash(&mut hasher);
            hasher.finish()
        })
        .collect();

    let mut hasher = DefaultHasher::new();
    image.dimensions().hash(&mut hasher);
    chunk_digests.hash(&mut hasher);
    hasher.finish()
}

/// Holds the backend-resident copy of the most recent source image.
/// At most one entry; a new key replaces the old entry and hands it back to
/// the caller, who decides when it is safe to free.
#[derive(Debug)]
pub struct SourceCache<T> {
    entry: Option<(u64, T)>,
}

impl<T> Default for SourceCache<T> {
    fn default() -> Self {
        Self { entry: None }
    }
}

impl<T> SourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: u64) -> Option<&T> {
        match &self.entry {
            Some((k, value)) if *k == key => Some(value),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<u64> {
        self.entry.as_ref().map(|(k, _)| *k)
    }

    /// Stores `value` under `key`, returning the evicted value if any.
    pub fn replace(&mut self, key: u64, value: T) -> Option<T> {
        self.entry.replace((key, value)).map(|(_, old)| old)
    }

    pub fn take(&mut self) -> Option<T> {
        self.entry.take().map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_tracks_content_and_shape() {
        let a = RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        let b = RgbaImage::from_pixel(2, 4, image::Rgba([10, 20, 30, 255]));
        let mut c = a.clone();
        c.put_pixel(3, 1, image::Rgba([10, 20, 31, 255]));
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn cache_holds_a_single_entry() {
        let mut cache = SourceCache::new();
        assert!(cache.replace(1, "first").is_none());
        assert_eq!(cache.get(1), Some(&"first"));
        assert_eq!(cache.replace(2, "second"), Some("first"));
        assert!(cache.get(1).is_none());
        assert_eq!(cache.key(), Some(2));
        assert_eq!(cache.take(), Some("second"));
        assert!(cache.key().is_none());
    }
}
