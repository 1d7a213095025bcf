//! Structured error types for docbridge.
//!
//! One enum covers converter boot, conversion, the CSV adapter, the editor
//! lifecycle, and the document façade. Boot failures have their own small
//! `Clone`-able enum so a shared in-flight boot future can hand the same
//! outcome to every waiter.

/// All errors that can occur while converting documents or driving the editor.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The converter module's ready signal never fired within the bounded wait.
    #[error("converter module initialization timed out")]
    InitTimeout,

    /// The converter host script loaded but never registered its entry point.
    #[error("converter module loaded but its entry point is missing")]
    ModuleMissing,

    /// Extension is not in the static extension→type table.
    #[error("unsupported file extension: {0}")]
    UnsupportedExtension(String),

    /// The converter's blocking entry point returned a non-zero code.
    #[error("conversion failed with exit code {0}")]
    ConversionFailed(i32),

    /// The on-demand spreadsheet library could not be fetched.
    #[error("spreadsheet library failed to load")]
    LibraryLoadFailed,

    /// CSV parse or encode failed. Not retried: a malformed file stays malformed.
    #[error("could not process CSV data ({0}); please convert the file to XLSX manually and try again")]
    CsvParseOrEncodeFailed(String),

    /// A writeFile event from the editor carried no bytes or no file name.
    #[error("writeFile event is missing byte data or a file name")]
    InvalidWriteFilePayload,

    /// No empty template is registered for the requested extension.
    #[error("no empty document template for {0}")]
    UnsupportedFileType(String),

    /// "Open existing" was requested without a decoded file.
    #[error("a file object is required to open an existing document")]
    InvalidFileObject,

    /// Virtual filesystem failure (primary paths only; auxiliary reads degrade).
    #[error("virtual filesystem: {0}")]
    Vfs(String),

    /// No live editor session where one was required.
    #[error("no active editor session")]
    NoActiveSession,

    /// XML parsing error from quick-xml.
    #[error("XML parsing: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIP archive error.
    #[error("ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for host-side failures reported as strings.
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Boot failures, separate so the shared in-flight future's output is `Clone`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    /// Ready signal did not fire in time.
    Timeout,
    /// Host script loaded, global entry point never appeared.
    MissingEntryPoint,
    /// The host script itself failed to load or run.
    Script(String),
}

impl From<BootError> for BridgeError {
    fn from(e: BootError) -> Self {
        match e {
            BootError::Timeout => Self::InitTimeout,
            BootError::MissingEntryPoint => Self::ModuleMissing,
            BootError::Script(msg) => Self::Other(msg),
        }
    }
}

impl From<String> for BridgeError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for BridgeError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

#[cfg(target_arch = "wasm32")]
impl From<BridgeError> for wasm_bindgen::JsValue {
    fn from(e: BridgeError) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}
