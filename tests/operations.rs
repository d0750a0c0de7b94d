//! Integration tests for the document operations on synthetic fixtures.
//!
//! Run with:
//!   cargo test --test operations

mod common;

use common::{
    docx, docx_paragraphs, empty_pdf, image_only_pdf, nested_text_pdf, page_count, page_text,
    text_pdf, ScriptedOcr,
};
use lopdf::Document;
use pdfdesk::ops::{self, StampPlacement, TextSource};
use pdfdesk::{DocError, ErrorKind, OcrCapability, PageLayout, SignOptions, SignStrategy};
use std::io::Read;
use std::sync::Arc;

// ── Merge and split ──────────────────────────────────────────────────────────

#[test]
fn split_then_merge_restores_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.pdf");
    text_pdf(&src, &[&["alpha"], &["bravo"], &["charlie"], &["delta"]]);

    let pages = ops::split(&src, &dir.path().join("pages"), None).unwrap();
    assert_eq!(pages.len(), 4);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.file_name().unwrap(), format!("page_{}.pdf", i + 1).as_str());
        assert_eq!(page_count(page), 1);
    }
    assert!(page_text(&pages[2], 1).contains("charlie"));

    let merged = dir.path().join("merged.pdf");
    ops::merge(&pages, &merged).unwrap();
    assert_eq!(page_count(&merged), 4);
    for (n, word) in (1..=4).zip(["alpha", "bravo", "charlie", "delta"]) {
        assert!(page_text(&merged, n).contains(word), "page {n} should be {word}");
    }
}

#[test]
fn merge_puts_first_input_first() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    let b = dir.path().join("b.pdf");
    text_pdf(&a, &[&["A1"], &["A2"]]);
    text_pdf(&b, &[&["B1"], &["B2"], &["B3"]]);

    let out = dir.path().join("out/merged.pdf");
    ops::merge(&[a, b], &out).unwrap();

    assert_eq!(page_count(&out), 5);
    assert!(page_text(&out, 1).contains("A1"));
    assert!(page_text(&out, 2).contains("A2"));
    assert!(page_text(&out, 3).contains("B1"));
    assert!(page_text(&out, 5).contains("B3"));
}

#[test]
fn merge_of_one_file_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    text_pdf(&a, &[&["only"]]);

    let err = ops::merge(&[a], &dir.path().join("out.pdf")).unwrap_err();
    assert!(matches!(err, DocError::TooFewInputs { count: 1 }));
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[test]
fn merge_rejects_docx_disguised_as_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.pdf");
    let fake = dir.path().join("b.pdf");
    text_pdf(&a, &[&["x"]]);
    docx(&fake, &[("not a pdf", false)]);

    let err = ops::merge(&[a, fake], &dir.path().join("out.pdf")).unwrap_err();
    assert!(matches!(err, DocError::NotAPdf { .. }));
}

#[test]
fn split_of_empty_document_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("empty.pdf");
    empty_pdf(&src);

    let pages = ops::split(&src, &dir.path().join("pages"), None).unwrap();
    assert!(pages.is_empty());
}

#[test]
fn split_pages_zip_lists_every_page() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.pdf");
    text_pdf(&src, &[&["one"], &["two"], &["three"]]);
    let pages = ops::split(&src, &dir.path().join("pages"), None).unwrap();

    let archive = dir.path().join("split_pages.zip");
    ops::zip_pages(&pages, &archive).unwrap();

    let mut zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(names, ["page_1.pdf", "page_2.pdf", "page_3.pdf"]);

    let mut first = Vec::new();
    zip.by_index(0).unwrap().read_to_end(&mut first).unwrap();
    assert!(first.starts_with(b"%PDF"));
}

// ── Sign ─────────────────────────────────────────────────────────────────────

/// Bytes of every content stream of every page, in page order.
fn content_streams(doc: &Document) -> Vec<Vec<(lopdf::ObjectId, Vec<u8>)>> {
    doc.get_pages()
        .into_values()
        .map(|page| {
            doc.get_page_contents(page)
                .into_iter()
                .map(|id| {
                    let stream = doc.get_object(id).unwrap().as_stream().unwrap();
                    (id, stream.content.clone())
                })
                .collect()
        })
        .collect()
}

#[test]
fn overlay_keeps_page_count_and_original_streams() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("contract.pdf");
    let out = dir.path().join("signed.pdf");
    text_pdf(&src, &[&["Terms"], &["Conditions"], &["Signature"]]);

    let outcome = ops::sign(&src, &out, "Ada Lovelace", &SignOptions::default()).unwrap();
    assert_eq!(outcome.placement, StampPlacement::FirstPage);
    assert_eq!(page_count(&out), 3);

    let before = content_streams(&Document::load(&src).unwrap());
    let after = content_streams(&Document::load(&out).unwrap());
    for (page, (orig, signed)) in before.iter().zip(&after).enumerate() {
        for stream in orig {
            assert!(
                signed.contains(stream),
                "page {} lost or changed content stream {:?}",
                page + 1,
                stream.0
            );
        }
    }
    assert!(page_text(&out, 1).contains("Signed by: Ada Lovelace"));
    assert!(page_text(&out, 1).contains("Terms"));
    assert!(!page_text(&out, 2).contains("Signed by"));
}

#[test]
fn append_page_adds_exactly_one_page() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("contract.pdf");
    let out = dir.path().join("signed.pdf");
    text_pdf(&src, &[&["Terms"], &["More terms"]]);

    let options = SignOptions {
        strategy: SignStrategy::AppendPage,
        ..SignOptions::default()
    };
    let outcome = ops::sign(&src, &out, "  ", &options).unwrap();
    assert_eq!(outcome.placement, StampPlacement::TrailingPage);
    assert_eq!(page_count(&out), 3);
    assert!(page_text(&out, 3).contains("Signed by: Signed User"));
    assert!(!page_text(&out, 1).contains("Signed by"));

    let before = content_streams(&Document::load(&src).unwrap());
    let after = content_streams(&Document::load(&out).unwrap());
    assert_eq!(before[..], after[..2]);
}

#[test]
fn overlay_on_pageless_document_is_skipped_not_failed() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("empty.pdf");
    let out = dir.path().join("signed.pdf");
    empty_pdf(&src);

    let outcome = ops::sign(&src, &out, "Ada", &SignOptions::default()).unwrap();
    assert!(matches!(outcome.placement, StampPlacement::Skipped { .. }));
    assert_eq!(page_count(&out), 0);
}

// ── Word → PDF ───────────────────────────────────────────────────────────────

#[test]
fn word_to_pdf_draws_paragraphs_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("letter.docx");
    let out = dir.path().join("letter.pdf");
    docx(
        &src,
        &[("Quarterly report", true), ("", false), ("Revenue grew.", false)],
    );

    ops::word_to_pdf(&src, &out, &PageLayout::default()).unwrap();
    assert_eq!(page_count(&out), 1);
    let text = page_text(&out, 1);
    let heading = text.find("Quarterly report").expect("heading drawn");
    let body = text.find("Revenue grew.").expect("body drawn");
    assert!(heading < body);
}

#[test]
fn empty_docx_renders_one_blank_page() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("blank.docx");
    let out = dir.path().join("blank.pdf");
    docx(&src, &[]);

    ops::word_to_pdf(&src, &out, &PageLayout::default()).unwrap();
    assert_eq!(page_count(&out), 1);
}

#[test]
fn long_docx_overflows_onto_more_pages() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("long.docx");
    let out = dir.path().join("long.pdf");
    let lines: Vec<String> = (1..=120).map(|i| format!("Line {i}")).collect();
    let paragraphs: Vec<(&str, bool)> = lines.iter().map(|l| (l.as_str(), false)).collect();
    docx(&src, &paragraphs);

    ops::word_to_pdf(&src, &out, &PageLayout::default()).unwrap();
    assert_eq!(page_count(&out), 3);
    assert!(page_text(&out, 3).contains("Line 120"));
}

#[test]
fn word_to_pdf_rejects_a_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("x.docx");
    text_pdf(&src, &[&["pdf inside"]]);

    let err = ops::word_to_pdf(&src, &dir.path().join("x.pdf"), &PageLayout::default())
        .unwrap_err();
    assert!(matches!(err, DocError::NotADocx { .. }));
    assert_eq!(err.kind(), ErrorKind::Input);
}

// ── PDF → Word ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_pdf_uses_text_layer_without_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("memo.pdf");
    let out = dir.path().join("memo.docx");
    text_pdf(&src, &[&["To: team", "Subject: launch"], &["We ship Friday."]]);
    let engine = Arc::new(ScriptedOcr::new(&["should not be used"]));

    let written = ops::pdf_to_word(&src, &out, &OcrCapability::with_engine(engine.clone()), None)
        .await
        .unwrap();

    assert_eq!(written.source, TextSource::Direct);
    assert_eq!(written.paragraphs, 3);
    assert_eq!(engine.calls(), 0);
    assert_eq!(
        docx_paragraphs(&out),
        ["To: team", "Subject: launch", "We ship Friday."]
    );
}

#[tokio::test]
async fn fonts_inherited_from_page_tree_are_extracted_directly() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("report.pdf");
    let out = dir.path().join("report.docx");
    nested_text_pdf(&src, &[&["Quarterly report"], &["Revenue up", "Costs flat"]]);

    let info = ops::inspect(&src).unwrap();
    assert_eq!(info.page_count, 2);
    assert!(info.has_text_layer);

    let written = ops::pdf_to_word(&src, &out, &OcrCapability::disabled("no pdfium"), None)
        .await
        .unwrap();
    assert_eq!(written.source, TextSource::Direct);
    assert_eq!(
        docx_paragraphs(&out),
        ["Quarterly report", "Revenue up", "Costs flat"]
    );
}

#[tokio::test]
async fn scanned_pdf_without_ocr_is_a_capability_error() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("scan.pdf");
    let out = dir.path().join("scan.docx");
    image_only_pdf(&src, 2);

    let err = ops::pdf_to_word(&src, &out, &OcrCapability::disabled("no pdfium"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DocError::OcrUnavailable { .. }));
    assert_eq!(err.kind(), ErrorKind::Capability);
    assert!(!out.exists());
}

#[tokio::test]
async fn scanned_pdf_goes_through_ocr_one_paragraph_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("scan.pdf");
    let out = dir.path().join("scan.docx");
    image_only_pdf(&src, 3);
    let engine = Arc::new(ScriptedOcr::new(&["Invoice 42", "", "Total: 10 EUR"]));

    let written = ops::pdf_to_word(&src, &out, &OcrCapability::with_engine(engine.clone()), None)
        .await
        .unwrap();

    assert_eq!(written.source, TextSource::Ocr);
    assert_eq!(engine.calls(), 1);
    assert_eq!(docx_paragraphs(&out), ["Invoice 42", "Total: 10 EUR"]);
}

#[tokio::test]
async fn ocr_that_reads_nothing_is_no_text_found() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("blank_scan.pdf");
    let out = dir.path().join("blank_scan.docx");
    image_only_pdf(&src, 2);
    let engine = Arc::new(ScriptedOcr::new(&["", "   "]));

    let err = ops::pdf_to_word(&src, &out, &OcrCapability::with_engine(engine), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DocError::NoTextFound { pages: 2, .. }));
    assert!(!out.exists());
}

#[tokio::test]
async fn word_round_trip_keeps_paragraph_text() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("notes.docx");
    let pdf = dir.path().join("notes.pdf");
    let back = dir.path().join("notes_back.docx");
    docx(&src, &[("Agenda", true), ("Budget review", false), ("Hiring", false)]);

    ops::word_to_pdf(&src, &pdf, &PageLayout::default()).unwrap();
    // Fonts sit on the root page-tree node, not on each page.
    assert!(ops::inspect(&pdf).unwrap().has_text_layer);
    let written = ops::pdf_to_word(&pdf, &back, &OcrCapability::disabled("not needed"), None)
        .await
        .unwrap();

    assert_eq!(written.source, TextSource::Direct);
    assert_eq!(docx_paragraphs(&back), ["Agenda", "Budget review", "Hiring"]);
}

#[test]
fn inspect_reports_text_layer() {
    let dir = tempfile::tempdir().unwrap();
    let text = dir.path().join("text.pdf");
    let scan = dir.path().join("scan.pdf");
    text_pdf(&text, &[&["hello"]]);
    image_only_pdf(&scan, 1);

    assert!(ops::inspect(&text).unwrap().has_text_layer);
    let info = ops::inspect(&scan).unwrap();
    assert!(!info.has_text_layer);
    assert_eq!(info.page_count, 1);
}
