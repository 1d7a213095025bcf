//! Save-to-disk collaborator.
//!
//! Prefers the OS save-file picker when the browser exposes one; otherwise
//! falls back to a synthetic anchor-click download. User cancellation of the
//! picker is a normal outcome, not an error.

use futures::future::LocalBoxFuture;

use crate::error::Result;

/// How a save attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The user dismissed the save dialog.
    Cancelled,
}

/// Persists produced files outside the page.
pub trait FileSaver {
    fn save(&self, file_name: &str, bytes: &[u8], mime: &str)
        -> LocalBoxFuture<'static, Result<SaveOutcome>>;
}

#[cfg(target_arch = "wasm32")]
pub use wasm::PickerSaver;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::{FileSaver, LocalBoxFuture, SaveOutcome};
    use crate::error::{BridgeError, Result};
    use crate::media::UrlAllocator;

    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    /// Picker-first saver with an anchor-click download fallback.
    #[derive(Default)]
    pub struct PickerSaver;

    impl PickerSaver {
        #[must_use]
        pub fn new() -> Self {
            Self
        }
    }

    impl FileSaver for PickerSaver {
        fn save(
            &self,
            file_name: &str,
            bytes: &[u8],
            mime: &str,
        ) -> LocalBoxFuture<'static, Result<SaveOutcome>> {
            let file_name = file_name.to_string();
            let bytes = bytes.to_vec();
            let mime = mime.to_string();
            Box::pin(async move {
                if let Some(picker) = save_picker() {
                    return picker_save(&picker, &file_name, &bytes).await;
                }
                anchor_download(&file_name, &bytes, &mime)
            })
        }
    }

    fn save_picker() -> Option<js_sys::Function> {
        let window = web_sys::window()?;
        js_sys::Reflect::get(&window, &JsValue::from_str("showSaveFilePicker"))
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
    }

    async fn picker_save(
        picker: &js_sys::Function,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<SaveOutcome> {
        let window: JsValue = web_sys::window()
            .ok_or_else(|| BridgeError::Other("no window".into()))?
            .into();

        let options = js_sys::Object::new();
        js_sys::Reflect::set(
            &options,
            &JsValue::from_str("suggestedName"),
            &JsValue::from_str(file_name),
        )
        .map_err(|_| BridgeError::Other("could not build picker options".into()))?;

        let pending = picker
            .call1(&window, &options)
            .map_err(|e| BridgeError::Other(format!("save picker failed: {e:?}")))?;
        let handle = match await_js(pending).await {
            Ok(handle) => handle,
            Err(e) if is_abort(&e) => return Ok(SaveOutcome::Cancelled),
            Err(e) => return Err(BridgeError::Other(format!("save picker rejected: {e:?}"))),
        };

        let writable = call0(&handle, "createWritable").await?;
        let array = js_sys::Uint8Array::from(bytes);
        call1(&writable, "write", &array).await?;
        call0(&writable, "close").await?;
        Ok(SaveOutcome::Saved)
    }

    /// Fallback: mint a blob URL and click a temporary download anchor.
    fn anchor_download(file_name: &str, bytes: &[u8], mime: &str) -> Result<SaveOutcome> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| BridgeError::Other("no document".into()))?;

        let urls = crate::media::BlobUrls::new();
        let url = urls.create_url(bytes, mime)?;

        let anchor: web_sys::HtmlAnchorElement = document
            .create_element("a")
            .map_err(|e| BridgeError::Other(format!("{e:?}")))?
            .dyn_into()
            .map_err(|_| BridgeError::Other("anchor cast failed".into()))?;
        anchor.set_href(&url);
        anchor.set_download(file_name);
        anchor.click();

        urls.revoke(&url);
        Ok(SaveOutcome::Saved)
    }

    async fn await_js(value: JsValue) -> std::result::Result<JsValue, JsValue> {
        match value.dyn_into::<js_sys::Promise>() {
            Ok(promise) => JsFuture::from(promise).await,
            Err(value) => Ok(value),
        }
    }

    async fn call0(target: &JsValue, name: &str) -> Result<JsValue> {
        let method = method(target, name)?;
        let pending = method
            .call0(target)
            .map_err(|e| BridgeError::Other(format!("{name} failed: {e:?}")))?;
        await_js(pending)
            .await
            .map_err(|e| BridgeError::Other(format!("{name} rejected: {e:?}")))
    }

    async fn call1(target: &JsValue, name: &str, arg: &JsValue) -> Result<JsValue> {
        let method = method(target, name)?;
        let pending = method
            .call1(target, arg)
            .map_err(|e| BridgeError::Other(format!("{name} failed: {e:?}")))?;
        await_js(pending)
            .await
            .map_err(|e| BridgeError::Other(format!("{name} rejected: {e:?}")))
    }

    fn method(target: &JsValue, name: &str) -> Result<js_sys::Function> {
        js_sys::Reflect::get(target, &JsValue::from_str(name))
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or_else(|| BridgeError::Other(format!("file handle has no {name}")))
    }

    fn is_abort(e: &JsValue) -> bool {
        js_sys::Reflect::get(e, &JsValue::from_str("name"))
            .ok()
            .and_then(|v| v.as_string())
            .is_some_and(|name| name == "AbortError")
    }
}
