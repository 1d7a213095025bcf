//! Shared test doubles.
//!
//! Fakes for every foreign subsystem the crate talks to: the converter
//! module and its virtual filesystem, the hosted editor component, object
//! URL minting, and the save dialog. Each fake records what it was asked to
//! do so tests can assert on ordering and payloads.
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use docbridge::convert::boot::{ConverterModule, ModuleLoader};
use docbridge::editor::host::{EditorCallbacks, EditorHost, EditorInstance};
use docbridge::editor::EditorLifecycle;
use docbridge::error::{BootError, BridgeError, Result};
use docbridge::facade::{Orchestrator, TemplateStore};
use docbridge::media::UrlAllocator;
use docbridge::save::{FileSaver, SaveOutcome};
use docbridge::tabular::BuiltinTabular;
use docbridge::vfs::{MemFs, VirtualFs, MEDIA_DIR};
use docbridge::ConverterSession;

// ============================================================================
// Converter module fakes
// ============================================================================

/// Emulates the converter: parses source/destination out of the params
/// document and applies an invertible byte transform, so bin payloads can be
/// converted back to their original bytes.
pub struct FakeModule {
    pub fs: MemFs,
    pub exit_code: Cell<i32>,
    /// Media entries dropped into `/working/media` on every forward
    /// conversion, emulating embedded-image extraction.
    pub media: RefCell<Vec<(String, Vec<u8>)>>,
    /// Params XML of the most recent conversion.
    pub last_params: RefCell<String>,
}

impl FakeModule {
    pub fn new() -> Self {
        Self {
            fs: MemFs::new(),
            exit_code: Cell::new(0),
            media: RefCell::new(Vec::new()),
            last_params: RefCell::new(String::new()),
        }
    }
}

impl ConverterModule for FakeModule {
    fn fs(&self) -> &dyn VirtualFs {
        &self.fs
    }

    fn convert(&self, params_path: &str) -> i32 {
        let params = self.fs.read_file(params_path).unwrap();
        let text = String::from_utf8(params).unwrap();
        *self.last_params.borrow_mut() = text.clone();

        if self.exit_code.get() != 0 {
            return self.exit_code.get();
        }

        let from = extract_tag(&text, "m_sFileFrom");
        let to = extract_tag(&text, "m_sFileTo");
        let input = self.fs.read_file(&from).unwrap();
        let out = if to.ends_with(".bin") {
            for (name, bytes) in self.media.borrow().iter() {
                self.fs
                    .write_file(&format!("{MEDIA_DIR}/{name}"), bytes)
                    .unwrap();
            }
            let mut out = b"BIN:".to_vec();
            out.extend_from_slice(&input);
            out
        } else {
            input
                .strip_prefix(b"BIN:".as_slice())
                .unwrap_or(&input)
                .to_vec()
        };
        self.fs.write_file(&to, &out).unwrap();
        0
    }
}

pub fn extract_tag(xml: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open).unwrap() + open.len();
    let end = xml.find(&close).unwrap();
    xml[start..end].to_string()
}

pub struct FakeLoader {
    pub module: Rc<FakeModule>,
    pub loads: Cell<u32>,
    pub fail_first: Cell<bool>,
}

impl FakeLoader {
    pub fn ok() -> Self {
        Self {
            module: Rc::new(FakeModule::new()),
            loads: Cell::new(0),
            fail_first: Cell::new(false),
        }
    }
}

impl ModuleLoader for FakeLoader {
    fn load(
        &self,
    ) -> LocalBoxFuture<'static, std::result::Result<Rc<dyn ConverterModule>, BootError>> {
        self.loads.set(self.loads.get() + 1);
        if self.fail_first.replace(false) {
            return Box::pin(async { Err(BootError::Timeout) });
        }
        let module: Rc<dyn ConverterModule> = Rc::clone(&self.module) as Rc<dyn ConverterModule>;
        Box::pin(async move { Ok(module) })
    }
}

// ============================================================================
// Object URL fake
// ============================================================================

#[derive(Default)]
pub struct FakeUrls {
    pub minted: RefCell<Vec<String>>,
    pub revoked: RefCell<Vec<String>>,
}

impl UrlAllocator for FakeUrls {
    fn create_url(&self, _bytes: &[u8], _mime: &str) -> Result<String> {
        let url = format!("blob:mock/{}", self.minted.borrow().len());
        self.minted.borrow_mut().push(url.clone());
        Ok(url)
    }

    fn revoke(&self, url: &str) {
        self.revoked.borrow_mut().push(url.to_string());
    }
}

// ============================================================================
// Editor host fake
// ============================================================================

/// Chronological record of host/instance activity, shared between the host
/// and every instance it creates.
pub type EventLog = Rc<RefCell<Vec<String>>>;
/// Every `sendCommand` with its payload.
pub type CommandLog = Rc<RefCell<Vec<(String, serde_json::Value)>>>;

pub struct RecordingHost {
    pub events: EventLog,
    pub commands: CommandLog,
    pub live: Rc<Cell<u32>>,
    /// When set, the next `create` fails once (editor script missing, bad
    /// container, and so on).
    pub fail_next_create: Cell<bool>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            events: Rc::new(RefCell::new(Vec::new())),
            commands: Rc::new(RefCell::new(Vec::new())),
            live: Rc::new(Cell::new(0)),
            fail_next_create: Cell::new(false),
        }
    }
}

impl EditorHost for RecordingHost {
    fn create(
        &self,
        config: &serde_json::Value,
        _callbacks: EditorCallbacks,
    ) -> Result<Box<dyn EditorInstance>> {
        if self.fail_next_create.replace(false) {
            self.events.borrow_mut().push("create-failed".to_string());
            return Err(BridgeError::Other("editor construction failed".into()));
        }
        let title = config["document"]["title"]
            .as_str()
            .unwrap_or("?")
            .to_string();
        self.events.borrow_mut().push(format!("create:{title}"));
        self.live.set(self.live.get() + 1);
        Ok(Box::new(RecordingInstance {
            events: Rc::clone(&self.events),
            commands: Rc::clone(&self.commands),
            live: Rc::clone(&self.live),
        }))
    }

    fn clear_container(&self) {
        self.events.borrow_mut().push("clear".to_string());
    }
}

pub struct RecordingInstance {
    events: EventLog,
    commands: CommandLog,
    live: Rc<Cell<u32>>,
}

impl EditorInstance for RecordingInstance {
    fn send_command(&self, command: &str, data: &serde_json::Value) -> Result<()> {
        self.events.borrow_mut().push(format!("cmd:{command}"));
        self.commands
            .borrow_mut()
            .push((command.to_string(), data.clone()));
        Ok(())
    }

    fn destroy(&self) {
        self.events.borrow_mut().push("destroy".to_string());
        self.live.set(self.live.get() - 1);
    }

    fn teardown_signal(&self) -> Option<LocalBoxFuture<'static, ()>> {
        None
    }
}

pub fn noop_callbacks() -> EditorCallbacks {
    EditorCallbacks {
        on_ready: Box::new(|| {}),
        on_save: Box::new(|_| {}),
        on_write_file: Box::new(|_| {}),
    }
}

// ============================================================================
// Saver fake
// ============================================================================

#[derive(Clone, Copy)]
pub enum SaveBehavior {
    Saved,
    Cancelled,
    Fail,
}

pub struct RecordingSaver {
    pub records: Rc<RefCell<Vec<(String, Vec<u8>, String)>>>,
    pub behavior: Cell<SaveBehavior>,
}

impl RecordingSaver {
    pub fn new() -> Self {
        Self {
            records: Rc::new(RefCell::new(Vec::new())),
            behavior: Cell::new(SaveBehavior::Saved),
        }
    }
}

impl FileSaver for RecordingSaver {
    fn save(
        &self,
        file_name: &str,
        bytes: &[u8],
        mime: &str,
    ) -> LocalBoxFuture<'static, Result<SaveOutcome>> {
        self.records
            .borrow_mut()
            .push((file_name.to_string(), bytes.to_vec(), mime.to_string()));
        let behavior = self.behavior.get();
        Box::pin(async move {
            match behavior {
                SaveBehavior::Saved => Ok(SaveOutcome::Saved),
                SaveBehavior::Cancelled => Ok(SaveOutcome::Cancelled),
                SaveBehavior::Fail => Err(BridgeError::Other("disk full".into())),
            }
        })
    }
}

// ============================================================================
// Assembled harness
// ============================================================================

/// Fully wired orchestrator over fakes, with handles onto every recorder.
pub struct Harness {
    pub orchestrator: Rc<Orchestrator>,
    pub converter: Rc<ConverterSession>,
    pub lifecycle: Rc<EditorLifecycle>,
    pub loader: Rc<FakeLoader>,
    pub host: Rc<RecordingHost>,
    pub urls: Rc<FakeUrls>,
    pub events: EventLog,
    pub commands: CommandLog,
    pub live: Rc<Cell<u32>>,
    pub saved: Rc<RefCell<Vec<(String, Vec<u8>, String)>>>,
    pub save_behavior: Rc<RecordingSaver>,
}

pub fn harness() -> Harness {
    let loader = Rc::new(FakeLoader::ok());
    let urls = Rc::new(FakeUrls::default());
    let converter = Rc::new(ConverterSession::new(
        Rc::clone(&loader) as Rc<dyn ModuleLoader>,
        Rc::new(BuiltinTabular::new()),
        Rc::clone(&urls) as Rc<dyn UrlAllocator>,
    ));

    let host = Rc::new(RecordingHost::new());
    let events = Rc::clone(&host.events);
    let commands = Rc::clone(&host.commands);
    let live = Rc::clone(&host.live);
    let lifecycle = Rc::new(EditorLifecycle::new(
        Rc::clone(&host) as Rc<dyn EditorHost>,
        Rc::clone(&urls) as Rc<dyn UrlAllocator>,
    ));

    let saver = Rc::new(RecordingSaver::new());
    let saved = Rc::clone(&saver.records);

    let orchestrator = Orchestrator::new(
        Rc::clone(&converter),
        Rc::clone(&lifecycle),
        TemplateStore::new(),
        Rc::clone(&saver) as Rc<dyn FileSaver>,
    );

    Harness {
        orchestrator,
        converter,
        lifecycle,
        loader,
        host,
        urls,
        events,
        commands,
        live,
        saved,
        save_behavior: saver,
    }
}
