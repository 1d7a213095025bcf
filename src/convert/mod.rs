//! Converter session.
//!
//! Owns the converter module handle, boots it lazily exactly once, and drives
//! the virtual-filesystem protocol for both conversion directions. CSV is the
//! one format the module cannot handle natively; it is bridged through XLSX
//! by the injected tabular adapter, with the result always reported under the
//! original CSV filename.

pub mod boot;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;

use crate::doctype::{self, format_code, DocumentType};
use crate::error::{BootError, BridgeError, Result};
use crate::media::{self, MediaMap, UrlAllocator};
use crate::params::{staged_paths, ConvertParams, PARAMS_PATH};
use crate::sanitize::sanitize_file_name;
use crate::tabular::TabularBridge;
use crate::vfs::{ensure_layout, FONTS_DIR, THEMES_DIR};

use boot::{ConverterModule, ModuleLoader};

#[cfg(target_arch = "wasm32")]
pub use boot::X2tLoader;

/// A decoded incoming file, as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

/// Output of a successful forward conversion.
#[derive(Debug)]
pub struct ConversionResult {
    /// Sanitized name the document is tracked under (the original CSV name
    /// for CSV sources, not the synthesized XLSX one).
    pub file_name: String,
    pub document_type: DocumentType,
    /// The binary payload the editor accepts.
    pub bin: Vec<u8>,
    pub media: MediaMap,
}

/// A file produced by the inverse conversion, ready for the save collaborator.
#[derive(Debug)]
pub struct SavedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

type BootFuture =
    Shared<LocalBoxFuture<'static, std::result::Result<Rc<dyn ConverterModule>, BootError>>>;

/// `Uninitialized → Initializing → Ready`; failure drops back to
/// `Uninitialized` so a later call can retry, success is cached for the
/// page's lifetime.
enum BootState {
    Uninitialized,
    Initializing(BootFuture),
    Ready(Rc<dyn ConverterModule>),
}

/// The conversion orchestrator. One per page.
pub struct ConverterSession {
    loader: Rc<dyn ModuleLoader>,
    tabular: Rc<dyn TabularBridge>,
    urls: Rc<dyn UrlAllocator>,
    state: RefCell<BootState>,
    /// Per-call sequence for staged path names; same-named files from
    /// successive conversions must never collide under `/working`.
    seq: Cell<u64>,
}

impl ConverterSession {
    #[must_use]
    pub fn new(
        loader: Rc<dyn ModuleLoader>,
        tabular: Rc<dyn TabularBridge>,
        urls: Rc<dyn UrlAllocator>,
    ) -> Self {
        Self {
            loader,
            tabular,
            urls,
            state: RefCell::new(BootState::Uninitialized),
            seq: Cell::new(0),
        }
    }

    /// Boot the converter module if it is not running yet.
    ///
    /// Idempotent; overlapping callers share a single in-flight boot.
    pub async fn initialize(&self) -> Result<Rc<dyn ConverterModule>> {
        let shared = {
            let mut state = self.state.borrow_mut();
            match &*state {
                BootState::Ready(module) => return Ok(Rc::clone(module)),
                BootState::Initializing(f) => f.clone(),
                BootState::Uninitialized => {
                    let f = self.loader.load().shared();
                    *state = BootState::Initializing(f.clone());
                    f
                }
            }
        };

        match shared.await {
            Ok(module) => {
                ensure_layout(module.fs())?;
                *self.state.borrow_mut() = BootState::Ready(Rc::clone(&module));
                Ok(module)
            }
            Err(e) => {
                *self.state.borrow_mut() = BootState::Uninitialized;
                Err(e.into())
            }
        }
    }

    /// Convert an arbitrary supported file to the editor's binary payload.
    pub async fn convert_to_bin(&self, input: &FileInput) -> Result<ConversionResult> {
        let ext = doctype::resolve_extension(input.mime.as_deref(), &input.name)?;
        let document_type = doctype::document_type_for(&ext)
            .ok_or_else(|| BridgeError::UnsupportedExtension(ext.clone()))?;

        if ext == "csv" {
            let (xlsx_name, xlsx_bytes) = self.tabular.csv_to_xlsx(&input.name, &input.bytes)?;
            let mut result = self.run_to_bin(&xlsx_name, &xlsx_bytes, document_type).await?;
            result.file_name = sanitize_file_name(&input.name);
            return Ok(result);
        }

        self.run_to_bin(&input.name, &input.bytes, document_type).await
    }

    /// Convert a binary payload back to `target_ext`.
    pub async fn convert_from_bin(
        &self,
        bin: &[u8],
        original_name: &str,
        target_ext: &str,
    ) -> Result<SavedFile> {
        if target_ext == "csv" {
            let xlsx = self.run_from_bin(bin, original_name, "xlsx").await?;
            let bytes = self.tabular.xlsx_to_csv(&xlsx.bytes)?;
            return Ok(SavedFile {
                file_name: replace_extension(&sanitize_file_name(original_name), "csv"),
                bytes,
                mime: doctype::mime_for_extension("csv"),
            });
        }

        self.run_from_bin(bin, original_name, target_ext).await
    }

    async fn run_to_bin(
        &self,
        name: &str,
        bytes: &[u8],
        document_type: DocumentType,
    ) -> Result<ConversionResult> {
        let module = self.initialize().await?;
        let fs = module.fs();

        let safe = sanitize_file_name(name);
        let (src, dst) = staged_paths(self.next_seq(), &safe, "bin");
        fs.write_file(&src, bytes)?;

        let params = ConvertParams {
            file_from: &src,
            file_to: &dst,
            theme_dir: THEMES_DIR,
            format_from: None,
            font_dir: None,
        };
        self.run(module.as_ref(), &params)?;

        let bin = fs.read_file(&dst)?;
        let media = media::extract_media(fs, self.urls.as_ref());
        Ok(ConversionResult {
            file_name: safe,
            document_type,
            bin,
            media,
        })
    }

    async fn run_from_bin(
        &self,
        bin: &[u8],
        original_name: &str,
        target_ext: &str,
    ) -> Result<SavedFile> {
        let module = self.initialize().await?;
        let fs = module.fs();

        let safe = sanitize_file_name(original_name);
        let (src, dst) = staged_paths(self.next_seq(), &replace_extension(&safe, "bin"), target_ext);
        fs.write_file(&src, bin)?;

        let params = ConvertParams {
            file_from: &src,
            file_to: &dst,
            theme_dir: THEMES_DIR,
            format_from: Some(format_code::CANVAS_BIN),
            font_dir: (target_ext == "pdf").then_some(FONTS_DIR),
        };
        self.run(module.as_ref(), &params)?;

        let bytes = fs.read_file(&dst)?;
        Ok(SavedFile {
            file_name: replace_extension(&safe, target_ext),
            bytes,
            mime: doctype::mime_for_extension(target_ext),
        })
    }

    /// Write the params document and invoke the blocking entry point.
    fn run(&self, module: &dyn ConverterModule, params: &ConvertParams) -> Result<()> {
        let fs = module.fs();
        fs.write_file(PARAMS_PATH, params.to_xml().as_bytes())?;

        let code = module.convert(PARAMS_PATH);
        if code != 0 {
            // Diagnostic re-read; it must never mask the original failure.
            match fs.read_file(PARAMS_PATH) {
                Ok(bytes) => log::warn!(
                    "converter exited with code {code}; params were: {}",
                    String::from_utf8_lossy(&bytes)
                ),
                Err(e) => log::warn!("converter exited with code {code}; params unreadable: {e}"),
            }
            return Err(BridgeError::ConversionFailed(code));
        }
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        let next = self.seq.get() + 1;
        self.seq.set(next);
        next
    }
}

/// Swap the extension of an already-sanitized name.
fn replace_extension(name: &str, ext: &str) -> String {
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    format!("{stem}.{ext}")
}
