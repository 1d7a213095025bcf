//! Remote spreadsheet-library bridge (wasm only).
//!
//! Alternative [`TabularBridge`] implementation backed by a third-party
//! spreadsheet library loaded from a remote script. The library is fetched
//! once, up front, and cached on the global scope; a failed fetch is
//! [`BridgeError::LibraryLoadFailed`] and is not retried automatically.

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use super::{decode_text, rename_to_xlsx, strip_bom, TabularBridge, UTF8_BOM};
use crate::error::{BridgeError, Result};

/// Name of the global the library registers itself under.
const LIBRARY_GLOBAL: &str = "XLSX";

/// Tabular bridge delegating to a remotely loaded spreadsheet library.
pub struct ScriptTabular {
    library: js_sys::Object,
}

impl ScriptTabular {
    /// Load the library script and resolve its global entry point.
    ///
    /// Returns the cached global immediately when a prior load already
    /// registered it.
    pub async fn load(script_url: &str) -> Result<Self> {
        if let Some(library) = lookup_global() {
            return Ok(Self { library });
        }

        inject_script(script_url).await?;

        let library = lookup_global().ok_or(BridgeError::LibraryLoadFailed)?;
        Ok(Self { library })
    }

    fn call(&self, path: &[&str], args: &js_sys::Array) -> Result<JsValue> {
        let mut target: JsValue = self.library.clone().into();
        let mut func: Option<js_sys::Function> = None;
        for (idx, name) in path.iter().enumerate() {
            let value = js_sys::Reflect::get(&target, &JsValue::from_str(name))
                .map_err(|_| wrap(&format!("library member {name} is missing")))?;
            if idx + 1 == path.len() {
                func = value.dyn_into::<js_sys::Function>().ok();
            } else {
                target = value;
            }
        }
        let func = func.ok_or_else(|| wrap("library entry point is not callable"))?;
        js_sys::Reflect::apply(&func, &target, args).map_err(|e| wrap(&format!("{e:?}")))
    }
}

impl TabularBridge for ScriptTabular {
    fn csv_to_xlsx(&self, file_name: &str, data: &[u8]) -> Result<(String, Vec<u8>)> {
        let text = decode_text(strip_bom(data));

        let read_opts = js_sys::Object::new();
        set(&read_opts, "type", &JsValue::from_str("string"))?;
        let args = js_sys::Array::of2(&JsValue::from_str(&text), &read_opts);
        let workbook = self.call(&["read"], &args)?;

        let write_opts = js_sys::Object::new();
        set(&write_opts, "type", &JsValue::from_str("array"))?;
        set(&write_opts, "bookType", &JsValue::from_str("xlsx"))?;
        let args = js_sys::Array::of2(&workbook, &write_opts);
        let out = self.call(&["write"], &args)?;

        let buffer = out
            .dyn_into::<js_sys::ArrayBuffer>()
            .map_err(|_| wrap("library returned non-binary workbook data"))?;
        let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
        Ok((rename_to_xlsx(file_name), bytes))
    }

    fn xlsx_to_csv(&self, data: &[u8]) -> Result<Vec<u8>> {
        let array = js_sys::Uint8Array::from(data);
        let read_opts = js_sys::Object::new();
        set(&read_opts, "type", &JsValue::from_str("array"))?;
        let args = js_sys::Array::of2(&array, &read_opts);
        let workbook = self.call(&["read"], &args)?;

        // First sheet only; later sheets are dropped by the CSV pipeline.
        let names = js_sys::Reflect::get(&workbook, &JsValue::from_str("SheetNames"))
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Array>().ok())
            .ok_or_else(|| wrap("workbook has no sheet list"))?;
        let first = names.get(0);
        if first.is_undefined() {
            return Err(wrap("workbook has no sheets"));
        }
        let sheets = js_sys::Reflect::get(&workbook, &JsValue::from_str("Sheets"))
            .map_err(|_| wrap("workbook has no sheet map"))?;
        let sheet = js_sys::Reflect::get(&sheets, &first).map_err(|_| wrap("first sheet missing"))?;

        let args = js_sys::Array::of1(&sheet);
        let csv = self
            .call(&["utils", "sheet_to_csv"], &args)?
            .as_string()
            .ok_or_else(|| wrap("library returned non-text CSV"))?;

        let mut out = Vec::with_capacity(csv.len() + UTF8_BOM.len());
        out.extend_from_slice(&UTF8_BOM);
        out.extend_from_slice(csv.as_bytes());
        Ok(out)
    }
}

fn wrap(msg: &str) -> BridgeError {
    BridgeError::CsvParseOrEncodeFailed(msg.to_string())
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) -> Result<()> {
    js_sys::Reflect::set(target, &JsValue::from_str(key), value)
        .map_err(|_| wrap("could not build library options"))?;
    Ok(())
}

fn lookup_global() -> Option<js_sys::Object> {
    let global = js_sys::global();
    let value = js_sys::Reflect::get(&global, &JsValue::from_str(LIBRARY_GLOBAL)).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    value.dyn_into::<js_sys::Object>().ok()
}

/// Append a script tag and await its load/error event.
async fn inject_script(url: &str) -> Result<()> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or(BridgeError::LibraryLoadFailed)?;

    let script: web_sys::HtmlScriptElement = document
        .create_element("script")
        .map_err(|_| BridgeError::LibraryLoadFailed)?
        .dyn_into()
        .map_err(|_| BridgeError::LibraryLoadFailed)?;
    script.set_src(url);

    let promise = js_sys::Promise::new(&mut |resolve, reject| {
        script.set_onload(Some(&resolve));
        script.set_onerror(Some(&reject));
    });

    document
        .head()
        .map(|head| head.append_child(&script))
        .transpose()
        .map_err(|_| BridgeError::LibraryLoadFailed)?;

    JsFuture::from(promise)
        .await
        .map_err(|_| BridgeError::LibraryLoadFailed)?;
    Ok(())
}
