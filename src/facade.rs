//! Document operation façade.
//!
//! Single entry point the page talks to: open an uploaded file or start from
//! an empty template, then forward editor events (ready, save, writeFile) to
//! the converter session and the lifecycle manager.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::convert::{ConverterSession, FileInput};
use crate::doctype;
use crate::editor::host::{EditorCallbacks, SaveRequest, WriteFilePayload};
use crate::editor::{EditorDocument, EditorLifecycle};
use crate::error::{BridgeError, Result};
use crate::media::MediaMap;
use crate::sanitize::sanitize_file_name;
use crate::save::{FileSaver, SaveOutcome};

/// Empty-document payloads, keyed by dotted extension (".docx").
///
/// Templates are injected by the host page at startup rather than baked into
/// the binary; an extension without a registered template is simply
/// unsupported for "new document".
#[derive(Default)]
pub struct TemplateStore {
    templates: RefCell<HashMap<String, Vec<u8>>>,
}

impl TemplateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, dotted_ext: impl Into<String>, bin: Vec<u8>) {
        self.templates
            .borrow_mut()
            .insert(dotted_ext.into().to_ascii_lowercase(), bin);
    }

    #[must_use]
    pub fn get(&self, dotted_ext: &str) -> Option<Vec<u8>> {
        self.templates
            .borrow()
            .get(&dotted_ext.to_ascii_lowercase())
            .cloned()
    }
}

/// One document operation from the page: either open an uploaded file or
/// create a fresh document from a template.
pub struct DocumentRequest {
    pub is_new: bool,
    /// Desired display name, extension included.
    pub file_name: String,
    /// Required when `is_new` is false.
    pub file: Option<FileInput>,
}

/// Ties the converter session, editor lifecycle, templates, and the saver
/// together behind the operations the page calls.
pub struct Orchestrator {
    converter: Rc<ConverterSession>,
    lifecycle: Rc<EditorLifecycle>,
    templates: TemplateStore,
    saver: Rc<dyn FileSaver>,
    /// Handle the editor event closures route back through.
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    weak_self: Weak<Orchestrator>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        converter: Rc<ConverterSession>,
        lifecycle: Rc<EditorLifecycle>,
        templates: TemplateStore,
        saver: Rc<dyn FileSaver>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            converter,
            lifecycle,
            templates,
            saver,
            weak_self: weak.clone(),
        })
    }

    /// Open or create a document and bring up an editor session for it.
    ///
    /// Exactly one editor create per call; any failure is logged here and
    /// rethrown so the page can surface it.
    pub async fn handle_document_operation(&self, request: DocumentRequest) -> Result<()> {
        let outcome = self.run_document_operation(&request).await;
        if let Err(e) = &outcome {
            log::error!("document operation for {:?} failed: {e}", request.file_name);
        }
        outcome
    }

    async fn run_document_operation(&self, request: &DocumentRequest) -> Result<()> {
        let doc = if request.is_new {
            self.document_from_template(&request.file_name)?
        } else {
            let file = request
                .file
                .as_ref()
                .ok_or(BridgeError::InvalidFileObject)?;
            let result = self.converter.convert_to_bin(file).await?;
            EditorDocument {
                file_name: result.file_name,
                document_type: result.document_type,
                bin: result.bin,
                media: result.media,
            }
        };
        self.lifecycle
            .create_session(doc, self.event_callbacks())
            .await
    }

    fn document_from_template(&self, file_name: &str) -> Result<EditorDocument> {
        let ext = doctype::file_extension(file_name)
            .ok_or_else(|| BridgeError::UnsupportedFileType(file_name.to_string()))?;
        let dotted = format!(".{ext}");
        let document_type = doctype::document_type_for(&ext)
            .ok_or_else(|| BridgeError::UnsupportedFileType(dotted.clone()))?;
        let bin = self
            .templates
            .get(&dotted)
            .ok_or(BridgeError::UnsupportedFileType(dotted))?;
        Ok(EditorDocument {
            file_name: sanitize_file_name(file_name),
            document_type,
            bin,
            media: MediaMap::new(),
        })
    }

    /// The editor frame is ready: push the opened document into it.
    pub async fn document_ready(&self) -> Result<()> {
        self.lifecycle.push_document().await
    }

    /// A save event from the editor: convert its binary back to the document
    /// format, hand the bytes to the saver, then release the editor's save
    /// cycle. The acknowledgement is unconditional; a cancelled or failed
    /// persistence must not leave the editor stuck mid-save.
    pub async fn handle_save_document(&self, request: SaveRequest) -> Result<()> {
        let file_name = self
            .lifecycle
            .current_file_name()
            .await
            .ok_or(BridgeError::NoActiveSession)?;

        let save = self.produce_and_persist(&request, &file_name).await;
        if let Err(e) = &save {
            log::error!("saving {file_name} failed: {e}");
        }

        let ack = self.lifecycle.ack_save().await;
        save.and(ack)
    }

    async fn produce_and_persist(&self, request: &SaveRequest, file_name: &str) -> Result<()> {
        let mut target_ext = doctype::extension_for_format(request.format_code)
            .ok_or_else(|| BridgeError::UnsupportedExtension(request.format_code.to_string()))?;
        // The editor reports CSV documents as spreadsheets; the tracked name
        // is authoritative for the output format.
        if file_name.to_ascii_lowercase().ends_with(".csv") {
            target_ext = "csv";
        }

        let saved = self
            .converter
            .convert_from_bin(&request.bin, file_name, target_ext)
            .await?;

        match self.saver.save(&saved.file_name, &saved.bytes, saved.mime).await {
            Ok(SaveOutcome::Saved) => log::info!("saved {}", saved.file_name),
            Ok(SaveOutcome::Cancelled) => {
                log::info!("save of {} cancelled by the user", saved.file_name);
            }
            Err(e) => log::warn!("could not persist {}: {e}", saved.file_name),
        }
        Ok(())
    }

    /// A writeFile event from the editor (pasted or imported media).
    pub async fn handle_write_file(&self, payload: WriteFilePayload) -> Result<()> {
        self.lifecycle.handle_write_file(payload).await
    }

    /// Destroy the live editor session, if any.
    pub async fn destroy(&self) {
        self.lifecycle.destroy_session().await;
    }

    /// Warm the converter module ahead of the first conversion.
    pub async fn warm_up(&self) -> Result<()> {
        self.converter.initialize().await.map(|_| ())
    }

    pub fn register_template(&self, dotted_ext: impl Into<String>, bin: Vec<u8>) {
        self.templates.register(dotted_ext, bin);
    }

    /// Editor event bindings that route back into this orchestrator.
    ///
    /// On the web target each event spawns the matching async handler; native
    /// tests drive the handlers directly instead.
    #[cfg(target_arch = "wasm32")]
    fn event_callbacks(&self) -> EditorCallbacks {
        let ready = self.weak_self.clone();
        let save = self.weak_self.clone();
        let write = self.weak_self.clone();
        EditorCallbacks {
            on_ready: Box::new(move || {
                let Some(this) = ready.upgrade() else { return };
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(e) = this.document_ready().await {
                        log::error!("pushing document into the editor failed: {e}");
                    }
                });
            }),
            on_save: Box::new(move |request| {
                let Some(this) = save.upgrade() else { return };
                wasm_bindgen_futures::spawn_local(async move {
                    if let Err(e) = this.handle_save_document(request).await {
                        log::error!("save handling failed: {e}");
                    }
                });
            }),
            on_write_file: Box::new(move |payload| {
                let Some(this) = write.upgrade() else { return };
                wasm_bindgen_futures::spawn_local(async move {
                    // Failures were already reported to the editor.
                    let _ = this.handle_write_file(payload).await;
                });
            }),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn event_callbacks(&self) -> EditorCallbacks {
        EditorCallbacks {
            on_ready: Box::new(|| log::debug!("editor ready")),
            on_save: Box::new(|_| log::debug!("editor save event")),
            on_write_file: Box::new(|_| log::debug!("editor writeFile event")),
        }
    }
}
