//! Host-scheduled delays.
//!
//! On wasm these resolve through `setTimeout`; on native targets they resolve
//! immediately, keeping the async control flow identical while tests run
//! without real waits.

/// Resolve after `ms` milliseconds on the browser event loop.
#[cfg(target_arch = "wasm32")]
pub(crate) async fn settle(ms: i32) {
    use wasm_bindgen_futures::JsFuture;

    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().and_then(|w| {
            w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
                .ok()
        });
        if scheduled.is_none() {
            // No window (worker shutdown): resolve immediately rather than hang
            let _ = resolve.call0(&wasm_bindgen::JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn settle(_ms: i32) {}
