//! Editor embedding contract.
//!
//! The hosted rich editor lives in an iframe owned by third-party script; the
//! crate only ever talks to it through construction, `sendCommand`, and a
//! no-argument destroy. These traits are that boundary, with a wasm
//! implementation driving the real component and fakes standing in natively.

use futures::future::LocalBoxFuture;

use crate::error::Result;

/// Commands accepted by the hosted editor's `sendCommand`.
pub mod commands {
    pub const SET_IMAGE_URLS: &str = "asc_setImageUrls";
    pub const OPEN_DOCUMENT: &str = "asc_openDocument";
    pub const WRITE_FILE_CALLBACK: &str = "asc_writeFileCallback";
    pub const ON_SAVE_CALLBACK: &str = "asc_onSaveCallback";
}

/// Save event reported by the editor: its binary payload plus the output
/// format it believes it should be saved as.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub format_code: u32,
    pub bin: Vec<u8>,
}

/// A writeFile event (image paste/import from inside the editor). Fields are
/// optional because the event arrives untyped; validation happens in the
/// lifecycle handler.
#[derive(Debug, Clone, Default)]
pub struct WriteFilePayload {
    pub file_name: Option<String>,
    pub data: Option<Vec<u8>>,
}

/// Callback bindings handed to the editor at construction.
pub struct EditorCallbacks {
    /// Editor frame is ready to receive the document payload.
    pub on_ready: Box<dyn Fn()>,
    /// User triggered a save.
    pub on_save: Box<dyn Fn(SaveRequest)>,
    /// Editor produced a new binary media file.
    pub on_write_file: Box<dyn Fn(WriteFilePayload)>,
}

/// A live hosted editor.
pub trait EditorInstance {
    fn send_command(&self, command: &str, data: &serde_json::Value) -> Result<()>;

    /// Begin asynchronous teardown. The component gives no completion
    /// callback, so this only starts the process.
    fn destroy(&self);

    /// Completion signal for teardown, when the host can observe one. `None`
    /// means the caller must fall back to a fixed grace delay.
    fn teardown_signal(&self) -> Option<LocalBoxFuture<'static, ()>>;
}

/// Creates editor instances inside a fixed DOM container.
pub trait EditorHost {
    fn create(
        &self,
        config: &serde_json::Value,
        callbacks: EditorCallbacks,
    ) -> Result<Box<dyn EditorInstance>>;

    /// Remove any stray children left in the container by a torn-down editor.
    fn clear_container(&self);
}

#[cfg(target_arch = "wasm32")]
pub use wasm::DocsHost;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::{EditorCallbacks, EditorHost, EditorInstance, SaveRequest, WriteFilePayload};
    use crate::error::{BridgeError, Result};

    use futures::future::LocalBoxFuture;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;

    /// Global constructor the editor component registers.
    const EDITOR_GLOBAL: &str = "DocEditor";

    /// Host for the third-party editor component.
    pub struct DocsHost {
        container_id: String,
    }

    impl DocsHost {
        #[must_use]
        pub fn new(container_id: impl Into<String>) -> Self {
            Self {
                container_id: container_id.into(),
            }
        }
    }

    impl EditorHost for DocsHost {
        fn create(
            &self,
            config: &serde_json::Value,
            callbacks: EditorCallbacks,
        ) -> Result<Box<dyn EditorInstance>> {
            let constructor = js_sys::Reflect::get(
                &js_sys::global(),
                &JsValue::from_str(EDITOR_GLOBAL),
            )
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| BridgeError::Other("editor component is not loaded".into()))?;

            let js_config: JsValue = serde_wasm_bindgen::to_value(config)
                .map_err(|e| BridgeError::Other(format!("editor config serialization: {e}")))?;

            // Event closures are attached onto the config's `events` object and
            // must stay alive as long as the instance.
            let events = js_sys::Object::new();

            let on_ready = callbacks.on_ready;
            let ready_closure = Closure::wrap(Box::new(move || on_ready()) as Box<dyn FnMut()>);
            set(&events, "onAppReady", ready_closure.as_ref())?;

            let doc_ready_closure = Closure::wrap(Box::new(move || {
                log::debug!("editor reports document ready");
            }) as Box<dyn FnMut()>);
            set(&events, "onDocumentReady", doc_ready_closure.as_ref())?;

            let on_save = callbacks.on_save;
            let save_closure = Closure::wrap(Box::new(move |event: JsValue| {
                on_save(decode_save_event(&event));
            }) as Box<dyn FnMut(JsValue)>);
            set(&events, "onSave", save_closure.as_ref())?;

            let on_write_file = callbacks.on_write_file;
            let write_closure = Closure::wrap(Box::new(move |event: JsValue| {
                on_write_file(decode_write_file_event(&event));
            }) as Box<dyn FnMut(JsValue)>);
            set(&events, "writeFile", write_closure.as_ref())?;

            js_sys::Reflect::set(&js_config, &JsValue::from_str("events"), &events)
                .map_err(|_| BridgeError::Other("could not attach editor events".into()))?;

            let args = js_sys::Array::of2(&JsValue::from_str(&self.container_id), &js_config);
            let editor = js_sys::Reflect::construct(&constructor, &args)
                .map_err(|e| BridgeError::Other(format!("editor construction failed: {e:?}")))?;

            Ok(Box::new(DocsInstance {
                editor,
                _closures: (ready_closure, doc_ready_closure, save_closure, write_closure),
            }))
        }

        fn clear_container(&self) {
            let Some(container) = web_sys::window()
                .and_then(|w| w.document())
                .and_then(|d| d.get_element_by_id(&self.container_id))
            else {
                return;
            };
            container.set_inner_html("");
        }
    }

    #[allow(clippy::type_complexity)]
    struct DocsInstance {
        editor: JsValue,
        _closures: (
            Closure<dyn FnMut()>,
            Closure<dyn FnMut()>,
            Closure<dyn FnMut(JsValue)>,
            Closure<dyn FnMut(JsValue)>,
        ),
    }

    impl EditorInstance for DocsInstance {
        fn send_command(&self, command: &str, data: &serde_json::Value) -> Result<()> {
            let method = js_sys::Reflect::get(&self.editor, &JsValue::from_str("sendCommand"))
                .ok()
                .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
                .ok_or_else(|| BridgeError::Other("editor has no sendCommand".into()))?;

            let payload = js_sys::Object::new();
            set(&payload, "command", &JsValue::from_str(command))?;
            let js_data: JsValue = serde_wasm_bindgen::to_value(data)
                .map_err(|e| BridgeError::Other(format!("command data serialization: {e}")))?;
            set(&payload, "data", &js_data)?;

            method
                .call1(&self.editor, &payload)
                .map_err(|e| BridgeError::Other(format!("sendCommand({command}) failed: {e:?}")))?;
            Ok(())
        }

        fn destroy(&self) {
            let Some(method) = js_sys::Reflect::get(&self.editor, &JsValue::from_str("destroy"))
                .ok()
                .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            else {
                return;
            };
            if let Err(e) = method.call0(&self.editor) {
                log::warn!("editor destroy threw: {e:?}");
            }
        }

        fn teardown_signal(&self) -> Option<LocalBoxFuture<'static, ()>> {
            // The component exposes no teardown-completion callback; callers
            // fall back to the fixed grace delay.
            None
        }
    }

    fn set(target: &js_sys::Object, key: &str, value: &JsValue) -> Result<()> {
        js_sys::Reflect::set(target, &JsValue::from_str(key), value)
            .map_err(|_| BridgeError::Other(format!("could not set editor field {key}")))?;
        Ok(())
    }

    fn decode_save_event(event: &JsValue) -> SaveRequest {
        let format_code = js_sys::Reflect::get(event, &JsValue::from_str("fileType"))
            .ok()
            .and_then(|v| v.as_f64())
            .map_or(0, |f| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    f as u32
                }
            });
        let bin = js_sys::Reflect::get(event, &JsValue::from_str("data"))
            .ok()
            .and_then(|v| normalize_bytes(&v))
            .unwrap_or_default();
        SaveRequest { format_code, bin }
    }

    fn decode_write_file_event(event: &JsValue) -> WriteFilePayload {
        let file_name = js_sys::Reflect::get(event, &JsValue::from_str("name"))
            .ok()
            .and_then(|v| v.as_string());
        let data = js_sys::Reflect::get(event, &JsValue::from_str("data"))
            .ok()
            .and_then(|v| normalize_bytes(&v));
        WriteFilePayload { file_name, data }
    }

    /// Binary event payloads arrive as `Uint8Array`, `ArrayBuffer`, or plain
    /// arrays of numbers.
    fn normalize_bytes(value: &JsValue) -> Option<Vec<u8>> {
        if let Some(array) = value.dyn_ref::<js_sys::Uint8Array>() {
            return Some(array.to_vec());
        }
        if let Some(buffer) = value.dyn_ref::<js_sys::ArrayBuffer>() {
            return Some(js_sys::Uint8Array::new(buffer).to_vec());
        }
        if let Some(array) = value.dyn_ref::<js_sys::Array>() {
            return Some(
                array
                    .iter()
                    .filter_map(|v| v.as_f64())
                    .map(|f| {
                        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        {
                            f as u8
                        }
                    })
                    .collect(),
            );
        }
        None
    }
}
