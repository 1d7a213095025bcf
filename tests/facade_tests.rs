//! Document façade integration tests: open/new routing, template lookup,
//! and the save pipeline including the CSV override.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod common;

use common::{harness, SaveBehavior};
use docbridge::convert::FileInput;
use docbridge::doctype::format_code;
use docbridge::editor::host::SaveRequest;
use docbridge::error::BridgeError;
use docbridge::facade::DocumentRequest;
use docbridge::tabular::UTF8_BOM;
use futures::executor::block_on;

fn open(name: &str, bytes: &[u8]) -> DocumentRequest {
    DocumentRequest {
        is_new: false,
        file_name: name.to_string(),
        file: Some(FileInput {
            name: name.to_string(),
            bytes: bytes.to_vec(),
            mime: None,
        }),
    }
}

fn new_doc(name: &str) -> DocumentRequest {
    DocumentRequest {
        is_new: true,
        file_name: name.to_string(),
        file: None,
    }
}

#[test]
fn test_open_converts_and_creates_one_session() {
    let h = harness();
    block_on(h.orchestrator.handle_document_operation(open("letter.docx", b"body"))).unwrap();

    assert_eq!(h.live.get(), 1);
    let creates = h
        .events
        .borrow()
        .iter()
        .filter(|e| e.starts_with("create:"))
        .count();
    assert_eq!(creates, 1);
}

#[test]
fn test_open_without_file_is_invalid() {
    let h = harness();
    let err = block_on(h.orchestrator.handle_document_operation(DocumentRequest {
        is_new: false,
        file_name: "a.docx".to_string(),
        file: None,
    }))
    .unwrap_err();
    assert!(matches!(err, BridgeError::InvalidFileObject));
    assert_eq!(h.live.get(), 0);
}

#[test]
fn test_new_document_uses_the_registered_template() {
    let h = harness();
    h.orchestrator.register_template(".docx", b"empty-docx".to_vec());
    block_on(h.orchestrator.handle_document_operation(new_doc("untitled.docx"))).unwrap();

    assert_eq!(h.live.get(), 1);
    block_on(h.orchestrator.document_ready()).unwrap();

    let commands = h.commands.borrow();
    let (name, payload) = commands.last().unwrap();
    assert_eq!(name, "asc_openDocument");
    assert_eq!(payload["fileName"], "untitled.docx");
    // b"empty-docx" base64-encoded
    assert_eq!(payload["buffer"], "ZW1wdHktZG9jeA==");
}

#[test]
fn test_new_document_without_template_is_unsupported() {
    let h = harness();
    let err = block_on(h.orchestrator.handle_document_operation(new_doc("untitled.xlsx")))
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedFileType(ref ext) if ext == ".xlsx"));
    assert_eq!(h.live.get(), 0);
    // No conversion was needed, so the module never booted
    assert_eq!(h.loader.loads.get(), 0);
}

#[test]
fn test_failed_conversion_leaves_no_session() {
    let h = harness();
    h.loader.module.exit_code.set(80);
    let err = block_on(h.orchestrator.handle_document_operation(open("a.docx", b"x"))).unwrap_err();
    assert!(matches!(err, BridgeError::ConversionFailed(80)));
    assert_eq!(h.live.get(), 0);
}

#[test]
fn test_save_produces_the_document_and_acknowledges() {
    let h = harness();
    block_on(h.orchestrator.handle_document_operation(open("letter.docx", b"body"))).unwrap();
    block_on(h.orchestrator.document_ready()).unwrap();

    let bin = b"BIN:body".to_vec();
    block_on(h.orchestrator.handle_save_document(SaveRequest {
        format_code: format_code::DOCX,
        bin,
    }))
    .unwrap();

    let saved = h.saved.borrow();
    assert_eq!(saved.len(), 1);
    let (name, bytes, mime) = &saved[0];
    assert_eq!(name, "letter.docx");
    assert_eq!(bytes, b"body");
    assert_eq!(
        mime,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );

    let commands = h.commands.borrow();
    let (cmd, ack) = commands.last().unwrap();
    assert_eq!(cmd, "asc_onSaveCallback");
    assert_eq!(ack["error"], 0);
}

#[test]
fn test_save_overrides_format_for_csv_documents() {
    let h = harness();
    block_on(
        h.orchestrator
            .handle_document_operation(open("data.csv", b"a,b\n1,2\n")),
    )
    .unwrap();

    // The payload the editor would hand back on save
    let opened_bin = block_on(h.converter.convert_to_bin(&FileInput {
        name: "data.csv".to_string(),
        bytes: b"a,b\n1,2\n".to_vec(),
        mime: None,
    }))
    .unwrap()
    .bin;

    // The editor self-reports spreadsheets as XLSX; the tracked .csv name wins
    block_on(h.orchestrator.handle_save_document(SaveRequest {
        format_code: format_code::XLSX,
        bin: opened_bin,
    }))
    .unwrap();

    let saved = h.saved.borrow();
    let (name, bytes, mime) = saved.last().unwrap();
    assert_eq!(name, "data.csv");
    assert_eq!(mime, "text/csv");
    assert!(bytes.starts_with(&UTF8_BOM));
}

#[test]
fn test_cancelled_save_still_acknowledges() {
    let h = harness();
    block_on(h.orchestrator.handle_document_operation(open("letter.docx", b"body"))).unwrap();
    h.save_behavior.behavior.set(SaveBehavior::Cancelled);

    block_on(h.orchestrator.handle_save_document(SaveRequest {
        format_code: format_code::DOCX,
        bin: b"BIN:body".to_vec(),
    }))
    .unwrap();

    let commands = h.commands.borrow();
    let (cmd, ack) = commands.last().unwrap();
    assert_eq!(cmd, "asc_onSaveCallback");
    assert_eq!(ack["error"], 0);
}

#[test]
fn test_failed_persistence_still_acknowledges() {
    let h = harness();
    block_on(h.orchestrator.handle_document_operation(open("letter.docx", b"body"))).unwrap();
    h.save_behavior.behavior.set(SaveBehavior::Fail);

    // Persistence failure is logged, not propagated
    block_on(h.orchestrator.handle_save_document(SaveRequest {
        format_code: format_code::DOCX,
        bin: b"BIN:body".to_vec(),
    }))
    .unwrap();

    let commands = h.commands.borrow();
    let (cmd, ack) = commands.last().unwrap();
    assert_eq!(cmd, "asc_onSaveCallback");
    assert_eq!(ack["error"], 0);
}

#[test]
fn test_unknown_save_format_errors_but_releases_the_editor() {
    let h = harness();
    block_on(h.orchestrator.handle_document_operation(open("letter.docx", b"body"))).unwrap();

    let err = block_on(h.orchestrator.handle_save_document(SaveRequest {
        format_code: 9999,
        bin: b"BIN:body".to_vec(),
    }))
    .unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedExtension(_)));

    // The editor still got its save release
    let commands = h.commands.borrow();
    let (cmd, ack) = commands.last().unwrap();
    assert_eq!(cmd, "asc_onSaveCallback");
    assert_eq!(ack["error"], 0);
    assert!(h.saved.borrow().is_empty());
}

#[test]
fn test_save_without_session_fails() {
    let h = harness();
    let err = block_on(h.orchestrator.handle_save_document(SaveRequest {
        format_code: format_code::DOCX,
        bin: Vec::new(),
    }))
    .unwrap_err();
    assert!(matches!(err, BridgeError::NoActiveSession));
}

#[test]
fn test_reopening_replaces_the_session() {
    let h = harness();
    block_on(h.orchestrator.handle_document_operation(open("one.docx", b"1"))).unwrap();
    block_on(h.orchestrator.handle_document_operation(open("two.docx", b"2"))).unwrap();

    assert_eq!(h.live.get(), 1);
    assert_eq!(
        block_on(h.lifecycle.current_file_name()),
        Some("two.docx".to_string())
    );
}
