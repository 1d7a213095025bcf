//! Virtual filesystem bridge.
//!
//! Thin adapter over the converter module's in-memory filesystem. The fixed
//! directory layout under `/working` is created once at module initialization
//! and persists for the page's lifetime.

use crate::error::{BridgeError, Result};

/// Root of all conversion staging paths.
pub const WORKING_DIR: &str = "/working";
/// Directory the converter extracts embedded media into.
pub const MEDIA_DIR: &str = "/working/media";
/// Font directory handed to PDF conversions.
pub const FONTS_DIR: &str = "/working/fonts";
/// Theme directory named in every params document.
pub const THEMES_DIR: &str = "/working/themes";

/// In-memory filesystem operations exposed by the converter module.
pub trait VirtualFs {
    /// Create a directory. Succeeds if it already exists.
    fn mkdir(&self, path: &str) -> Result<()>;
    /// Write a file, replacing any previous content.
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
    /// Read a file's bytes.
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    /// List directory entries, including the `.`/`..` pseudo-entries.
    fn read_dir(&self, path: &str) -> Result<Vec<String>>;
}

/// Idempotently create the fixed working-directory layout.
pub fn ensure_layout(fs: &dyn VirtualFs) -> Result<()> {
    for dir in [WORKING_DIR, MEDIA_DIR, FONTS_DIR, THEMES_DIR] {
        fs.mkdir(dir)?;
    }
    Ok(())
}

/// In-memory `VirtualFs` used on native targets and in tests.
#[derive(Default)]
pub struct MemFs {
    files: std::cell::RefCell<std::collections::BTreeMap<String, Vec<u8>>>,
    dirs: std::cell::RefCell<std::collections::BTreeSet<String>>,
}

impl MemFs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VirtualFs for MemFs {
    fn mkdir(&self, path: &str) -> Result<()> {
        self.dirs.borrow_mut().insert(path.trim_end_matches('/').to_string());
        Ok(())
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.files.borrow_mut().insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::Vfs(format!("no such file: {path}")))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        let dir = path.trim_end_matches('/');
        if !self.dirs.borrow().contains(dir) {
            return Err(BridgeError::Vfs(format!("no such directory: {path}")));
        }
        let prefix = format!("{dir}/");
        let mut entries = vec![".".to_string(), "..".to_string()];
        for name in self.files.borrow().keys() {
            if let Some(rest) = name.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    entries.push(rest.to_string());
                }
            }
        }
        Ok(entries)
    }
}

/// Adapter over an Emscripten-style `FS` object exported by the converter
/// module. Bytes returned by `readFile` may be a `Uint8Array` or any other
/// binary-like value; they are normalized to `Vec<u8>` here.
#[cfg(target_arch = "wasm32")]
pub struct ModuleFs {
    fs: js_sys::Object,
}

#[cfg(target_arch = "wasm32")]
impl ModuleFs {
    #[must_use]
    pub fn new(fs: js_sys::Object) -> Self {
        Self { fs }
    }

    fn method(&self, name: &str) -> Result<js_sys::Function> {
        let value = js_sys::Reflect::get(&self.fs, &wasm_bindgen::JsValue::from_str(name))
            .map_err(|_| BridgeError::Vfs(format!("FS.{name} is missing")))?;
        value
            .dyn_into::<js_sys::Function>()
            .map_err(|_| BridgeError::Vfs(format!("FS.{name} is not callable")))
    }

    fn call1(&self, name: &str, arg: &wasm_bindgen::JsValue) -> Result<wasm_bindgen::JsValue> {
        self.method(name)?
            .call1(&self.fs, arg)
            .map_err(|e| BridgeError::Vfs(format!("FS.{name} failed: {e:?}")))
    }
}

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;

#[cfg(target_arch = "wasm32")]
impl VirtualFs for ModuleFs {
    fn mkdir(&self, path: &str) -> Result<()> {
        // mkdir throws EEXIST on repeats; that is fine for the fixed layout.
        let _ = self.call1("mkdir", &wasm_bindgen::JsValue::from_str(path));
        Ok(())
    }

    fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let array = js_sys::Uint8Array::from(data);
        self.method("writeFile")?
            .call2(&self.fs, &wasm_bindgen::JsValue::from_str(path), &array)
            .map_err(|e| BridgeError::Vfs(format!("FS.writeFile({path}) failed: {e:?}")))?;
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let value = self.call1("readFile", &wasm_bindgen::JsValue::from_str(path))?;
        normalize_bytes(&value)
            .ok_or_else(|| BridgeError::Vfs(format!("FS.readFile({path}) returned non-binary data")))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<String>> {
        let value = self.call1("readdir", &wasm_bindgen::JsValue::from_str(path))?;
        let array = value
            .dyn_into::<js_sys::Array>()
            .map_err(|_| BridgeError::Vfs(format!("FS.readdir({path}) returned a non-array")))?;
        Ok(array.iter().filter_map(|v| v.as_string()).collect())
    }
}

/// Normalize a binary-like JS value (`Uint8Array` or `ArrayBuffer`) to bytes.
#[cfg(target_arch = "wasm32")]
fn normalize_bytes(value: &wasm_bindgen::JsValue) -> Option<Vec<u8>> {
    if let Some(array) = value.dyn_ref::<js_sys::Uint8Array>() {
        return Some(array.to_vec());
    }
    if let Some(buffer) = value.dyn_ref::<js_sys::ArrayBuffer>() {
        return Some(js_sys::Uint8Array::new(buffer).to_vec());
    }
    None
}
