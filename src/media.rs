//! Media extractor.
//!
//! After a forward conversion the converter leaves any embedded media it
//! extracted under `/working/media`. Each file becomes a transient object URL
//! keyed by its relative path (`media/<name>`). Absence of media is a valid
//! outcome; a single unreadable entry is skipped, never fatal.

use std::collections::BTreeMap;

use crate::doctype::media_mime;
use crate::error::Result;
use crate::vfs::{VirtualFs, MEDIA_DIR};

/// Relative media path → process-local object URL.
pub type MediaMap = BTreeMap<String, String>;

/// Mints and revokes process-local object URLs for byte payloads.
pub trait UrlAllocator {
    fn create_url(&self, bytes: &[u8], mime: &str) -> Result<String>;
    fn revoke(&self, url: &str);
}

/// Harvest extracted media from the virtual filesystem into a [`MediaMap`].
pub fn extract_media(fs: &dyn VirtualFs, urls: &dyn UrlAllocator) -> MediaMap {
    let mut map = MediaMap::new();

    let entries = match fs.read_dir(MEDIA_DIR) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("no media directory after conversion: {e}");
            return map;
        }
    };

    for name in entries {
        if name == "." || name == ".." {
            continue;
        }
        let path = format!("{MEDIA_DIR}/{name}");
        let bytes = match fs.read_file(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("skipping unreadable media entry {path}: {e}");
                continue;
            }
        };
        match urls.create_url(&bytes, media_mime(&name)) {
            Ok(url) => {
                map.insert(format!("media/{name}"), url);
            }
            Err(e) => {
                log::warn!("could not mint object URL for {path}: {e}");
            }
        }
    }
    map
}

/// Object URLs backed by browser blobs.
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
pub struct BlobUrls;

#[cfg(target_arch = "wasm32")]
impl BlobUrls {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_arch = "wasm32")]
impl UrlAllocator for BlobUrls {
    fn create_url(&self, bytes: &[u8], mime: &str) -> Result<String> {
        let array = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
        let options = web_sys::BlobPropertyBag::new();
        options.set_type(mime);
        let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&array, &options)
            .map_err(|e| crate::error::BridgeError::Other(format!("blob creation failed: {e:?}")))?;
        web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|e| crate::error::BridgeError::Other(format!("object URL failed: {e:?}")))
    }

    fn revoke(&self, url: &str) {
        if let Err(e) = web_sys::Url::revoke_object_url(url) {
            log::debug!("revoking {url} failed: {e:?}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::vfs::{ensure_layout, MemFs};
    use std::cell::RefCell;

    /// Counter-based allocator; can be told to fail for specific payloads.
    #[derive(Default)]
    struct FakeUrls {
        minted: RefCell<u32>,
        fail_on: Option<Vec<u8>>,
    }

    impl UrlAllocator for FakeUrls {
        fn create_url(&self, bytes: &[u8], _mime: &str) -> crate::error::Result<String> {
            if self.fail_on.as_deref() == Some(bytes) {
                return Err(BridgeError::Other("mint failure".into()));
            }
            let mut n = self.minted.borrow_mut();
            *n += 1;
            Ok(format!("blob:mock/{n}"))
        }

        fn revoke(&self, _url: &str) {}
    }

    #[test]
    fn test_extracts_all_media_entries() {
        let fs = MemFs::new();
        ensure_layout(&fs).unwrap();
        fs.write_file("/working/media/image1.png", b"one").unwrap();
        fs.write_file("/working/media/image2.jpeg", b"two").unwrap();

        let map = extract_media(&fs, &FakeUrls::default());
        assert_eq!(map.len(), 2);
        assert!(map.contains_key("media/image1.png"));
        assert!(map.contains_key("media/image2.jpeg"));
    }

    #[test]
    fn test_missing_media_directory_yields_empty_map() {
        let fs = MemFs::new();
        let map = extract_media(&fs, &FakeUrls::default());
        assert!(map.is_empty());
    }

    #[test]
    fn test_one_bad_entry_keeps_the_rest() {
        let fs = MemFs::new();
        ensure_layout(&fs).unwrap();
        fs.write_file("/working/media/good1.png", b"g1").unwrap();
        fs.write_file("/working/media/bad.png", b"bad").unwrap();
        fs.write_file("/working/media/good2.png", b"g2").unwrap();

        let urls = FakeUrls {
            fail_on: Some(b"bad".to_vec()),
            ..Default::default()
        };
        let map = extract_media(&fs, &urls);
        assert_eq!(map.len(), 2);
        assert!(!map.contains_key("media/bad.png"));
    }
}
