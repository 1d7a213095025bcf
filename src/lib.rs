//! docbridge - browser-side office document conversion and editor embedding
//!
//! Drives a WASM-compiled converter module and a hosted rich editor from the
//! browser:
//! - Converts office documents (DOCX, XLSX, PPTX, ODF, RTF, TXT, CSV, PDF)
//!   to and from the editor's binary format
//! - Stages files through the converter's in-memory virtual filesystem
//! - Extracts embedded media into blob URLs for the editor
//! - Serializes editor create/destroy so at most one instance is ever live
//!
//! # Usage (JavaScript)
//!
//! ```javascript
//! import init, { DocBridge } from 'docbridge';
//! await init();
//! const bridge = new DocBridge('editor-container', '/x2t/x2t.js');
//! bridge.register_template('.docx', emptyDocxBin);
//! await bridge.open_document(file.name, bytes, file.type);
//! ```

pub mod convert;
pub mod doctype;
pub mod editor;
pub mod error;
pub mod facade;
pub mod media;
pub mod params;
pub mod sanitize;
pub mod save;
pub mod tabular;
pub(crate) mod timers;
pub mod vfs;

pub use convert::{ConversionResult, ConverterSession, FileInput, SavedFile};
pub use editor::{EditorDocument, EditorLifecycle};
pub use error::{BootError, BridgeError, Result};
pub use facade::{DocumentRequest, Orchestrator, TemplateStore};

/// Crate version, for diagnostics.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(target_arch = "wasm32")]
mod bindings {
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::future_to_promise;

    use crate::convert::{ConverterSession, FileInput, X2tLoader};
    use crate::editor::host::DocsHost;
    use crate::editor::EditorLifecycle;
    use crate::facade::{DocumentRequest, Orchestrator, TemplateStore};
    use crate::media::BlobUrls;
    use crate::save::PickerSaver;
    use crate::tabular::{script::ScriptTabular, BuiltinTabular, TabularBridge};

    #[wasm_bindgen(start)]
    pub fn start() {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Debug).is_err() {
            // Logger was already installed by the host page.
        }
    }

    /// JavaScript-facing entry point wrapping the orchestrator.
    #[wasm_bindgen]
    pub struct DocBridge {
        inner: Rc<Orchestrator>,
    }

    fn assemble(
        container_id: String,
        converter_script_url: String,
        tabular: Rc<dyn TabularBridge>,
    ) -> DocBridge {
        let urls = Rc::new(BlobUrls::new());
        let converter = Rc::new(ConverterSession::new(
            Rc::new(X2tLoader::new(converter_script_url)),
            tabular,
            Rc::clone(&urls) as Rc<dyn crate::media::UrlAllocator>,
        ));
        let lifecycle = Rc::new(EditorLifecycle::new(
            Rc::new(DocsHost::new(container_id)),
            urls,
        ));
        let inner = Orchestrator::new(
            converter,
            lifecycle,
            TemplateStore::new(),
            Rc::new(PickerSaver::new()),
        );
        DocBridge { inner }
    }

    #[wasm_bindgen]
    impl DocBridge {
        /// Build a bridge rendering into `container_id`, booting the converter
        /// from `converter_script_url` on first use. CSV documents are handled
        /// by the built-in adapter.
        #[wasm_bindgen(constructor)]
        #[must_use]
        pub fn new(container_id: String, converter_script_url: String) -> DocBridge {
            assemble(
                container_id,
                converter_script_url,
                Rc::new(BuiltinTabular::new()),
            )
        }

        /// Build a bridge whose CSV handling delegates to a spreadsheet
        /// library fetched from `tabular_script_url` up front. Resolves to the
        /// bridge, or rejects if the library cannot be loaded.
        pub fn with_tabular_library(
            container_id: String,
            converter_script_url: String,
            tabular_script_url: String,
        ) -> js_sys::Promise {
            future_to_promise(async move {
                let tabular = ScriptTabular::load(&tabular_script_url).await?;
                let bridge = assemble(container_id, converter_script_url, Rc::new(tabular));
                Ok(JsValue::from(bridge))
            })
        }

        /// Register an empty-document template for `dotted_ext` (".docx").
        pub fn register_template(&self, dotted_ext: String, bin: Vec<u8>) {
            self.inner.register_template(dotted_ext, bin);
        }

        /// Boot the converter module ahead of the first open.
        pub fn warm_up(&self) -> js_sys::Promise {
            let inner = Rc::clone(&self.inner);
            future_to_promise(async move {
                inner.warm_up().await?;
                Ok(JsValue::UNDEFINED)
            })
        }

        /// Open an uploaded file in the editor.
        pub fn open_document(
            &self,
            name: String,
            bytes: Vec<u8>,
            mime: Option<String>,
        ) -> js_sys::Promise {
            let inner = Rc::clone(&self.inner);
            future_to_promise(async move {
                inner
                    .handle_document_operation(DocumentRequest {
                        is_new: false,
                        file_name: name.clone(),
                        file: Some(FileInput { name, bytes, mime }),
                    })
                    .await?;
                Ok(JsValue::UNDEFINED)
            })
        }

        /// Create a fresh document from a registered template.
        pub fn new_document(&self, name: String) -> js_sys::Promise {
            let inner = Rc::clone(&self.inner);
            future_to_promise(async move {
                inner
                    .handle_document_operation(DocumentRequest {
                        is_new: true,
                        file_name: name,
                        file: None,
                    })
                    .await?;
                Ok(JsValue::UNDEFINED)
            })
        }

        /// Tear down the live editor session, if any.
        pub fn destroy(&self) -> js_sys::Promise {
            let inner = Rc::clone(&self.inner);
            future_to_promise(async move {
                inner.destroy().await;
                Ok(JsValue::UNDEFINED)
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use bindings::DocBridge;
