//! Editor lifecycle manager.
//!
//! At most one hosted editor instance exists at any time. A single-slot async
//! lock guards the live session: every create/destroy acquires it first and
//! releases it on scope exit, so a failing transition can never wedge later
//! ones, and two rapid `create` calls serialize into destroy-then-create.

pub mod host;

use std::rc::Rc;

use base64::Engine;
use futures::lock::Mutex;

use crate::doctype::{file_extension, media_mime, DocumentType};
use crate::error::{BridgeError, Result};
use crate::media::{MediaMap, UrlAllocator};
use crate::timers::settle;

use host::{commands, EditorCallbacks, EditorHost, EditorInstance, WriteFilePayload};

/// Fallback wait after starting teardown. The hosted editor tears down
/// asynchronously without a documented completion signal; this bound is a
/// heuristic, not a guarantee, and is skipped when the host can observe real
/// completion.
pub(crate) const TEARDOWN_GRACE_MS: i32 = 150;

/// Second wait before constructing the replacement instance; document-type
/// switches need extra settling time.
pub(crate) const CREATE_GRACE_MS: i32 = 150;

/// Everything needed to bring up an editor for one document.
pub struct EditorDocument {
    pub file_name: String,
    pub document_type: DocumentType,
    pub bin: Vec<u8>,
    pub media: MediaMap,
}

/// The single live session and its owned resources.
#[derive(Default)]
struct Slot {
    instance: Option<Box<dyn EditorInstance>>,
    file_name: Option<String>,
    bin: Vec<u8>,
    media: MediaMap,
}

/// Serializes all editor create/destroy transitions.
pub struct EditorLifecycle {
    editor_host: Rc<dyn EditorHost>,
    urls: Rc<dyn UrlAllocator>,
    slot: Mutex<Slot>,
}

impl EditorLifecycle {
    #[must_use]
    pub fn new(editor_host: Rc<dyn EditorHost>, urls: Rc<dyn UrlAllocator>) -> Self {
        Self {
            editor_host,
            urls,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Tear down any prior editor and construct a new one for `doc`.
    pub async fn create_session(
        &self,
        doc: EditorDocument,
        callbacks: EditorCallbacks,
    ) -> Result<()> {
        let mut slot = self.slot.lock().await;

        self.teardown_locked(&mut slot).await;
        self.editor_host.clear_container();
        settle(CREATE_GRACE_MS).await;

        let config = editor_config(&doc);
        let instance = match self.editor_host.create(&config, callbacks) {
            Ok(instance) => instance,
            Err(e) => {
                // The document's media URLs never reach the slot on this
                // path, so teardown would miss them.
                for url in doc.media.values() {
                    self.urls.revoke(url);
                }
                return Err(e);
            }
        };

        slot.instance = Some(instance);
        slot.file_name = Some(doc.file_name);
        slot.bin = doc.bin;
        slot.media = doc.media;
        Ok(())
    }

    /// Destroy the live session, if any. Used on page teardown.
    pub async fn destroy_session(&self) {
        let mut slot = self.slot.lock().await;
        self.teardown_locked(&mut slot).await;
    }

    async fn teardown_locked(&self, slot: &mut Slot) {
        if let Some(instance) = slot.instance.take() {
            let signal = instance.teardown_signal();
            instance.destroy();
            match signal {
                Some(done) => done.await,
                None => settle(TEARDOWN_GRACE_MS).await,
            }
        }
        // Object URLs are revoked only here, never eagerly; the editor may
        // still have referenced them asynchronously up to this point.
        for url in slot.media.values() {
            self.urls.revoke(url);
        }
        slot.media.clear();
        slot.file_name = None;
        slot.bin.clear();
    }

    /// Push the current document payload and media into the ready editor.
    pub async fn push_document(&self) -> Result<()> {
        let slot = self.slot.lock().await;
        let instance = slot.instance.as_ref().ok_or(BridgeError::NoActiveSession)?;

        instance.send_command(
            commands::SET_IMAGE_URLS,
            &serde_json::json!({ "urls": slot.media }),
        )?;
        instance.send_command(
            commands::OPEN_DOCUMENT,
            &serde_json::json!({
                "fileName": slot.file_name,
                "buffer": base64::engine::general_purpose::STANDARD.encode(&slot.bin),
            }),
        )?;
        Ok(())
    }

    /// Handle a writeFile event: mint an object URL for the new media bytes
    /// and acknowledge to the editor.
    ///
    /// Failures are reported back to the editor as a structured error and
    /// returned; an imported-asset failure must never tear down the session.
    pub async fn handle_write_file(&self, payload: WriteFilePayload) -> Result<()> {
        let mut slot = self.slot.lock().await;
        let outcome = self.write_file_locked(&mut slot, payload);

        if let Err(e) = &outcome {
            log::warn!("writeFile handling failed: {e}");
            if let Some(instance) = slot.instance.as_ref() {
                let report = instance.send_command(
                    commands::WRITE_FILE_CALLBACK,
                    &serde_json::json!({ "error": 1, "message": e.to_string() }),
                );
                if let Err(report_err) = report {
                    log::warn!("could not report writeFile failure: {report_err}");
                }
            }
        }
        outcome
    }

    fn write_file_locked(&self, slot: &mut Slot, payload: WriteFilePayload) -> Result<()> {
        let (Some(name), Some(data)) = (payload.file_name, payload.data) else {
            return Err(BridgeError::InvalidWriteFilePayload);
        };
        if name.is_empty() || data.is_empty() {
            return Err(BridgeError::InvalidWriteFilePayload);
        }
        let instance = slot.instance.as_ref().ok_or(BridgeError::NoActiveSession)?;

        let url = self.urls.create_url(&data, media_mime(&name))?;
        slot.media.insert(format!("media/{name}"), url.clone());

        instance.send_command(
            commands::SET_IMAGE_URLS,
            &serde_json::json!({ "urls": slot.media }),
        )?;
        instance.send_command(
            commands::WRITE_FILE_CALLBACK,
            &serde_json::json!({ "error": 0, "file": name, "url": url }),
        )?;
        Ok(())
    }

    /// Notify the editor that its save cycle completed.
    ///
    /// Always error code 0: the signal is about the editor's internal state,
    /// not the external persistence outcome.
    pub async fn ack_save(&self) -> Result<()> {
        let slot = self.slot.lock().await;
        let instance = slot.instance.as_ref().ok_or(BridgeError::NoActiveSession)?;
        instance.send_command(commands::ON_SAVE_CALLBACK, &serde_json::json!({ "error": 0 }))
    }

    /// Filename the live session is tracked under.
    pub async fn current_file_name(&self) -> Option<String> {
        self.slot.lock().await.file_name.clone()
    }

    /// Whether a live instance exists. Test/diagnostic helper.
    pub async fn has_instance(&self) -> bool {
        self.slot.lock().await.instance.is_some()
    }

    /// Snapshot of the current media map.
    pub async fn media_snapshot(&self) -> MediaMap {
        self.slot.lock().await.media.clone()
    }
}

/// Build the editor configuration object for one document.
fn editor_config(doc: &EditorDocument) -> serde_json::Value {
    let file_type = file_extension(&doc.file_name).unwrap_or_default();
    serde_json::json!({
        "document": {
            "title": doc.file_name,
            // Synthetic URL: the document never leaves the page
            "url": doc.file_name,
            "fileType": file_type,
            "permissions": {
                "edit": true,
                "chat": false,
                "protect": false,
            },
        },
        "documentType": doc.document_type.as_str(),
        "editorConfig": {
            "customization": {
                "help": false,
                "about": false,
                "hideRightMenu": true,
                "spellcheck": { "change": false },
                "anonymous": { "request": false },
            },
        },
    })
}
