//! Converter module boot.
//!
//! The WASM-compiled converter ships as a host script that registers a global
//! factory. Booting fetches the script, invokes the factory, and waits for
//! the runtime-ready signal within a bounded window. The traits here are the
//! seam that lets the session run against a fake module natively.

use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::BootError;
use crate::vfs::VirtualFs;

/// Bounded wait for the module's ready signal.
pub const BOOT_TIMEOUT_MS: i32 = 300_000;

/// A booted converter module: its virtual filesystem plus the single blocking
/// conversion entry point.
pub trait ConverterModule {
    fn fs(&self) -> &dyn VirtualFs;
    /// Run one conversion described by the params document at `params_path`.
    /// Returns the converter's exit code; zero is success.
    fn convert(&self, params_path: &str) -> i32;
}

/// Asynchronously produces a booted [`ConverterModule`].
pub trait ModuleLoader {
    fn load(&self) -> LocalBoxFuture<'static, std::result::Result<Rc<dyn ConverterModule>, BootError>>;
}

#[cfg(target_arch = "wasm32")]
pub use wasm::X2tLoader;

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::{BootError, ConverterModule, LocalBoxFuture, Rc, BOOT_TIMEOUT_MS};
    use crate::vfs::{ModuleFs, VirtualFs};

    use futures::future::{select, Either};
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    /// Global the converter host script is expected to register.
    const ENTRY_GLOBAL: &str = "X2T";

    /// Boots the converter from a remote host script.
    pub struct X2tLoader {
        script_url: String,
    }

    impl X2tLoader {
        #[must_use]
        pub fn new(script_url: impl Into<String>) -> Self {
            Self {
                script_url: script_url.into(),
            }
        }
    }

    impl super::ModuleLoader for X2tLoader {
        fn load(
            &self,
        ) -> LocalBoxFuture<'static, std::result::Result<Rc<dyn ConverterModule>, BootError>>
        {
            let url = self.script_url.clone();
            Box::pin(async move {
                inject_script(&url).await?;

                let factory = entry_factory().ok_or(BootError::MissingEntryPoint)?;
                let pending = factory
                    .call0(&JsValue::UNDEFINED)
                    .map_err(|e| BootError::Script(format!("module factory threw: {e:?}")))?;

                let module = wait_ready(pending).await?;

                let fs_value = js_sys::Reflect::get(&module, &JsValue::from_str("FS"))
                    .map_err(|_| BootError::MissingEntryPoint)?;
                let fs_object = fs_value
                    .dyn_into::<js_sys::Object>()
                    .map_err(|_| BootError::MissingEntryPoint)?;
                let ccall = js_sys::Reflect::get(&module, &JsValue::from_str("ccall"))
                    .ok()
                    .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
                    .ok_or(BootError::MissingEntryPoint)?;

                let booted: Rc<dyn ConverterModule> = Rc::new(X2tModule {
                    module,
                    fs: ModuleFs::new(fs_object),
                    ccall,
                });
                Ok(booted)
            })
        }
    }

    struct X2tModule {
        module: JsValue,
        fs: ModuleFs,
        ccall: js_sys::Function,
    }

    impl ConverterModule for X2tModule {
        fn fs(&self) -> &dyn VirtualFs {
            &self.fs
        }

        fn convert(&self, params_path: &str) -> i32 {
            // ccall("main1", "number", ["string"], [params_path])
            let arg_types = js_sys::Array::of1(&JsValue::from_str("string"));
            let args = js_sys::Array::of1(&JsValue::from_str(params_path));
            let call_args = js_sys::Array::of4(
                &JsValue::from_str("main1"),
                &JsValue::from_str("number"),
                &arg_types,
                &args,
            );
            match js_sys::Reflect::apply(&self.ccall, &self.module, &call_args) {
                #[allow(clippy::cast_possible_truncation)]
                Ok(code) => code.as_f64().map_or(-1, |c| c as i32),
                Err(e) => {
                    log::error!("converter entry point threw: {e:?}");
                    -1
                }
            }
        }
    }

    fn entry_factory() -> Option<js_sys::Function> {
        let value =
            js_sys::Reflect::get(&js_sys::global(), &JsValue::from_str(ENTRY_GLOBAL)).ok()?;
        value.dyn_into::<js_sys::Function>().ok()
    }

    /// Await the factory's ready promise, bounded by [`BOOT_TIMEOUT_MS`].
    async fn wait_ready(pending: JsValue) -> std::result::Result<JsValue, BootError> {
        let Ok(promise) = pending.clone().dyn_into::<js_sys::Promise>() else {
            // Factory returned the module synchronously
            return Ok(pending);
        };

        let ready = Box::pin(JsFuture::from(promise));
        let timeout = Box::pin(crate::timers::settle(BOOT_TIMEOUT_MS));
        match select(ready, timeout).await {
            Either::Left((result, _)) => {
                result.map_err(|e| BootError::Script(format!("module boot rejected: {e:?}")))
            }
            Either::Right(((), _)) => Err(BootError::Timeout),
        }
    }

    /// Append the converter host script and await load/error.
    async fn inject_script(url: &str) -> std::result::Result<(), BootError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| BootError::Script("no document".into()))?;

        let script: web_sys::HtmlScriptElement = document
            .create_element("script")
            .map_err(|e| BootError::Script(format!("{e:?}")))?
            .dyn_into()
            .map_err(|_| BootError::Script("script element cast failed".into()))?;
        script.set_src(url);

        let promise = js_sys::Promise::new(&mut |resolve, reject| {
            script.set_onload(Some(&resolve));
            script.set_onerror(Some(&reject));
        });

        document
            .head()
            .map(|head| head.append_child(&script))
            .transpose()
            .map_err(|e| BootError::Script(format!("{e:?}")))?;

        JsFuture::from(promise)
            .await
            .map_err(|_| BootError::Script(format!("converter script failed to load: {url}")))?;
        Ok(())
    }
}
