//! Pipeline integration tests driven by a scripted model.
//!
//! No network, API key or pdfium library is needed: documents are fed as
//! pre-split text pages or single-unit CSV/text uploads, and every model
//! call is answered by `MockModel`.

use edgequake_docextract::ledger::Feedback;
use edgequake_docextract::testing::MockModel;
use edgequake_docextract::{
    ApiResponse, DocExtractError, DocumentBody, DocumentService, DocumentType, ExtractionConfig,
    ExtractionProgressCallback, Extractor, GenerationRequest, MediaType, ModelTask, PageFailurePolicy,
    PageUnit, ServiceError, VerificationMode,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Helpers ──────────────────────────────────────────────────────────────────

const VERIFIED: &str = r#"{"verified": true, "discrepancies": [], "summary": "All figures reconcile."}"#;

/// The page text embedded in a coercion prompt.
fn page_text(req: &GenerationRequest) -> String {
    let prompt = req.prompt_text();
    let start = prompt.find("\"\"\"\n").map(|i| i + 4).unwrap_or(0);
    let end = prompt.rfind("\n\"\"\"").unwrap_or(prompt.len());
    prompt[start..end].to_string()
}

/// Raw-text calls echo the page; coercion returns the page text as-is
/// (pages are authored as JSON); verification always succeeds.
fn scripted(req: &GenerationRequest) -> Result<String, ServiceError> {
    match req.task {
        ModelTask::RawText => Ok(req.prompt_text().rsplit("\n\n").next().unwrap_or("").to_string()),
        ModelTask::SchemaCoercion => Ok(page_text(req)),
        ModelTask::Verification => Ok(VERIFIED.to_string()),
        ModelTask::VendorResearch => Ok("Acme Corp makes anvils.".to_string()),
    }
}

fn pages(texts: &[Value]) -> Vec<PageUnit> {
    texts
        .iter()
        .enumerate()
        .map(|(i, v)| PageUnit::new(i, v.to_string().into_bytes(), MediaType::PlainText))
        .collect()
}

fn extractor(model: &MockModel, config: ExtractionConfig) -> Extractor {
    Extractor::new(Arc::new(model.clone()), config)
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_pages_concatenate_line_items_with_one_report() {
    let model = MockModel::new(scripted);
    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(
            pages(&[json!({"lineItems": [{"id": 1}]}), json!({"lineItems": [{"id": 2}]})]),
            None,
        )
        .await
        .expect("extraction should succeed");

    let doc = out.body.as_structured().expect("structured body");
    assert_eq!(doc["lineItems"], json!([{"id": 1}, {"id": 2}]));
    assert_eq!(doc["mathVerification"]["verified"], json!(true));
    assert!(doc.get("extractionVerification").is_none());

    // Two calls per page plus exactly one verification call.
    assert_eq!(model.calls_for(ModelTask::RawText).len(), 2);
    assert_eq!(model.calls_for(ModelTask::SchemaCoercion).len(), 2);
    assert_eq!(model.calls_for(ModelTask::Verification).len(), 1);

    let report = out.report.expect("report");
    assert!(report.verified);
    assert_eq!(report.document_type, Some(DocumentType::Invoice));
    assert_eq!(out.stats.extracted_pages, 2);
}

#[tokio::test]
async fn merge_rules_hold_across_pages() {
    let model = MockModel::new(scripted);
    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(
            pages(&[
                json!({
                    "documentMetadata": {"documentType": "invoice", "currency": null,
                                         "fileInfo": {"OCRProcessed": false}},
                    "financialData": {"totalAmount": 100},
                    "mathVerification": {"verified": false}
                }),
                json!({
                    "documentMetadata": {"currency": "USD", "fileInfo": {"OCRProcessed": true}},
                    "financialData": {"totalAmount": 200}
                }),
            ]),
            None,
        )
        .await
        .unwrap();

    let doc = out.body.as_structured().unwrap();
    assert_eq!(doc["financialData"]["totalAmount"], json!(100));
    assert_eq!(doc["documentMetadata"]["currency"], json!("USD"));
    assert_eq!(doc["documentMetadata"]["fileInfo"]["OCRProcessed"], json!(true));
    // The page-supplied report was stripped; only the real one remains.
    assert_eq!(doc["mathVerification"]["summary"], json!("All figures reconcile."));
}

#[tokio::test]
async fn invalid_middle_page_is_skipped() {
    let model = MockModel::new(scripted);
    let mut units = pages(&[json!({"lineItems": [{"id": 1}]}), json!({}), json!({"lineItems": [{"id": 3}]})]);
    units[1] = PageUnit::new(1, b"this page is a photo of a cat".to_vec(), MediaType::PlainText);

    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(units, None)
        .await
        .unwrap();
    let doc = out.body.as_structured().unwrap();
    assert_eq!(doc["lineItems"], json!([{"id": 1}, {"id": 3}]));
    assert_eq!(out.stats.unparsed_pages, 1);
    assert!(!out.pages[1].parsed);
}

#[tokio::test]
async fn out_of_order_completion_keeps_page_order() {
    let model = MockModel::new(scripted).with_delay(|req| {
        // Page 1 is the slowest, page 3 the fastest.
        let text = req.prompt_text();
        if text.contains("\"id\":1") {
            Duration::from_millis(60)
        } else if text.contains("\"id\":2") {
            Duration::from_millis(30)
        } else {
            Duration::from_millis(1)
        }
    });
    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(
            pages(&[
                json!({"lineItems": [{"id": 1}]}),
                json!({"lineItems": [{"id": 2}]}),
                json!({"lineItems": [{"id": 3}]}),
            ]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        out.body.as_structured().unwrap()["lineItems"],
        json!([{"id": 1}, {"id": 2}, {"id": 3}])
    );
}

#[tokio::test]
async fn abort_policy_fails_whole_document() {
    let model = MockModel::new(|req| {
        if req.task == ModelTask::RawText && req.prompt_text().contains("\"id\":2") {
            return Err(ServiceError::api("429 rate limited"));
        }
        scripted(req)
    });
    let config = ExtractionConfig::builder()
        .page_failure_policy(PageFailurePolicy::Abort)
        .build()
        .unwrap();

    let err = extractor(&model, config)
        .process_pages(
            pages(&[json!({"lineItems": [{"id": 1}]}), json!({"lineItems": [{"id": 2}]})]),
            None,
        )
        .await
        .unwrap_err();
    match err {
        DocExtractError::PageFailed(e) => assert_eq!(e.page(), 2),
        other => panic!("expected PageFailed, got {other}"),
    }
    assert!(model.calls_for(ModelTask::Verification).is_empty());
}

#[tokio::test]
async fn skip_policy_merges_surviving_pages() {
    let model = MockModel::new(|req| {
        if req.task == ModelTask::RawText && req.prompt_text().contains("\"id\":2") {
            return Err(ServiceError::api("429 rate limited"));
        }
        scripted(req)
    });
    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(
            pages(&[json!({"lineItems": [{"id": 1}]}), json!({"lineItems": [{"id": 2}]})]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(out.stats.failed_pages, 1);
    assert_eq!(out.body.as_structured().unwrap()["lineItems"], json!([{"id": 1}]));
    assert!(out.pages[1].error.is_some());
}

#[tokio::test]
async fn verification_failure_still_returns_document() {
    let model = MockModel::new(|req| match req.task {
        ModelTask::Verification => Err(ServiceError::Timeout { secs: 120 }),
        _ => scripted(req),
    });
    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(pages(&[json!({"financialData": {"totalAmount": 5}})]), None)
        .await
        .unwrap();
    let doc = out.body.as_structured().unwrap();
    assert_eq!(doc["financialData"]["totalAmount"], json!(5));
    assert_eq!(doc["mathVerification"]["verified"], json!(false));
    assert!(doc["mathVerification"]["summary"]
        .as_str()
        .unwrap()
        .starts_with("Verification failed"));
}

#[tokio::test]
async fn discrepancies_are_capped_in_attached_report() {
    let mut discrepancies: Vec<Value> = (0..3)
        .map(|i| json!({"type": "total", "location": format!("h{i}"), "significance": "High"}))
        .collect();
    discrepancies.extend((0..9).map(|i| json!({"type": "line", "location": format!("m{i}"), "significance": "Medium"})));
    let reply = json!({"verified": false, "discrepancies": discrepancies, "summary": "many"}).to_string();

    let model = MockModel::new(move |req| match req.task {
        ModelTask::Verification => Ok(reply.clone()),
        _ => scripted(req),
    });
    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(pages(&[json!({"lineItems": []})]), None)
        .await
        .unwrap();

    let attached = &out.body.as_structured().unwrap()["mathVerification"]["discrepancies"];
    assert_eq!(attached.as_array().map(Vec::len), Some(3));
    assert!(attached
        .as_array()
        .unwrap()
        .iter()
        .all(|d| d["significance"] == json!("High")));
}

#[tokio::test]
async fn extraction_mode_attaches_under_its_key() {
    let model = MockModel::new(scripted);
    let config = ExtractionConfig::builder()
        .verification(VerificationMode::Extraction)
        .build()
        .unwrap();
    let out = extractor(&model, config)
        .process_pages(pages(&[json!({"documentMetadata": {"documentType": "BankStatement"}})]), None)
        .await
        .unwrap();
    let doc = out.body.as_structured().unwrap();
    assert!(doc.get("extractionVerification").is_some());
    assert!(doc.get("mathVerification").is_none());
    assert_eq!(out.document_type, Some(DocumentType::BankStatement));
}

#[tokio::test]
async fn progress_callback_sees_every_page() {
    #[derive(Default)]
    struct Counter {
        started: AtomicUsize,
        completed: AtomicUsize,
        document_type: Mutex<Option<String>>,
    }
    impl ExtractionProgressCallback for Counter {
        fn on_page_start(&self, _: usize, _: usize) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_page_complete(&self, _: usize, _: usize, _: usize) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
        fn on_verification_start(&self, document_type: &str) {
            *self.document_type.lock().unwrap() = Some(document_type.to_string());
        }
    }

    let counter = Arc::new(Counter::default());
    let config = ExtractionConfig::builder()
        .progress_callback(counter.clone())
        .build()
        .unwrap();
    extractor(&MockModel::new(scripted), config)
        .process_pages(pages(&[json!({"a": 1}), json!({"b": 2})]), None)
        .await
        .unwrap();

    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 2);
    assert_eq!(counter.document_type.lock().unwrap().as_deref(), Some("invoice"));
}

#[tokio::test]
async fn schema_dir_schema_reaches_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("941.json"), r#"{"quarterlyWages": null}"#).unwrap();

    let model = MockModel::new(scripted);
    let config = ExtractionConfig::builder().schema_dir(dir.path()).build().unwrap();
    let out = extractor(&model, config)
        .process_pages(pages(&[json!({"quarterlyWages": 1000})]), Some("941"))
        .await
        .unwrap();

    assert_eq!(out.schema.as_str(), "941");
    let coercion = &model.calls_for(ModelTask::SchemaCoercion)[0];
    assert!(coercion.prompt.contains("quarterlyWages"));
    assert!(coercion.prompt.contains("Form 941"));
}

// ── Service ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_wraps_document_in_envelope() {
    let model = MockModel::new(|req| match req.task {
        ModelTask::RawText => Ok("ACME INVOICE | Widget | 40.00".to_string()),
        ModelTask::SchemaCoercion => Ok(json!({
            "documentMetadata": {"documentType": "invoice", "documentDate": "2024-02-01"},
            "partyInformation": {"vendor": {"name": "Acme Corp"}},
            "lineItems": [
                {"description": "Widget", "amount": 40.0, "accountCode": "5000"},
                {"description": "Install", "amount": 250.0, "accountCode": "5100"}
            ]
        })
        .to_string()),
        _ => scripted(req),
    });
    let service = DocumentService::new(extractor(&model, ExtractionConfig::default()));

    let response = service.upload("invoice.txt", b"scan".to_vec(), None).await;
    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["response"]["partyInformation"]["vendor"]["name"], json!("Acme Corp"));
    assert_eq!(wire["response"]["mathVerification"]["verified"], json!(true));

    let txs = service.transactions();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].category.as_deref(), Some("Low Value"));
    assert_eq!(txs[1].category.as_deref(), Some("High Value"));
}

#[tokio::test]
async fn failed_upload_reports_generic_error() {
    let model = MockModel::new(|_| Err(ServiceError::api("invalid api key")));
    let service = DocumentService::new(extractor(&model, ExtractionConfig::default()));

    let response = service.upload("notes.txt", b"hello".to_vec(), None).await;
    match response {
        ApiResponse::Error { error, detail } => {
            assert_eq!(error, "Request failed");
            assert!(detail.contains("invalid api key"), "detail: {detail}");
        }
        other => panic!("expected error envelope, got {other:?}"),
    }
    assert!(service.transactions().is_empty());
}

#[tokio::test]
async fn csv_upload_feeds_ledger_feedback_and_export() {
    let model = MockModel::new(|req| match req.task {
        ModelTask::SchemaCoercion => Ok(r#"{"lineItems": []}"#.to_string()),
        _ => scripted(req),
    });
    let service = DocumentService::new(extractor(&model, ExtractionConfig::default()));

    let csv = b"2024-01-05,12.50,Coffee,6000\n2024-01-06,420.00,Acme Corp,5000\n";
    assert!(!service.upload("ledger.csv", csv.to_vec(), None).await.is_error());

    let txs = service.transactions();
    assert_eq!(txs.len(), 2);
    let coffee_id = txs[0].transaction_id.clone();

    let updated = service
        .submit_feedback(Feedback {
            transaction_id: coffee_id.clone(),
            corrected_category: "Meals".into(),
            comments: Some("team breakfast".into()),
        })
        .unwrap();
    assert_eq!(updated.category.as_deref(), Some("Meals"));

    let exported = service.export("CSV").unwrap();
    assert!(exported.contains("2024-01-05T00:00:00,12.5,Coffee,6000,Meals"));
    let qbo = service.export("qbo").unwrap();
    assert!(qbo.contains("TRNS\tCHECK\t01/06/2024\t420\tAcme Corp\t5000"));
    assert!(service.export("pdf").is_err());

    let research = service.research_transaction(&txs[1].transaction_id).await.unwrap();
    assert_eq!(research.vendor_name, "Acme Corp");
    assert_eq!(research.vendor_info, "Acme Corp makes anvils.");
    assert!(service.research_transaction("missing").await.is_err());
}

#[tokio::test]
async fn unstructured_reply_is_returned_as_text() {
    let model = MockModel::new(|req| match req.task {
        ModelTask::SchemaCoercion => Ok("  I could not map this page to the schema.  ".to_string()),
        _ => scripted(req),
    });
    let service = DocumentService::new(extractor(&model, ExtractionConfig::default()));
    let out = service
        .extract_and_record("memo.txt", b"hello".to_vec(), None)
        .await
        .unwrap();
    assert_eq!(
        out.body,
        DocumentBody::Raw("I could not map this page to the schema.".to_string())
    );
    assert_eq!(out.response_text(), "I could not map this page to the schema.");
    assert!(out.report.is_none());
}

#[tokio::test]
async fn damaged_pdf_upload_never_reaches_the_model() {
    let model = MockModel::new(scripted);
    let ex = extractor(&model, ExtractionConfig::default());

    // Without a pdfium library the splitter fails to bind; with one it
    // rejects the bytes. Either way the upload is not treated as text.
    let err = ex
        .process_bytes("statement.pdf", b"\x00\x01garbage, truncated upload".to_vec(), None)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            DocExtractError::DocumentFormat { .. } | DocExtractError::PdfiumBindingFailed(_)
        ),
        "got {err:?}"
    );

    let service = DocumentService::new(ex);
    let response = service
        .upload("statement.pdf", b"\x00\x01garbage".to_vec(), None)
        .await;
    assert!(response.is_error());
    assert_eq!(model.call_count(), 0);
    assert!(service.transactions().is_empty());
}

#[tokio::test]
async fn array_reply_is_not_merged_as_object() {
    let model = MockModel::new(|req| match req.task {
        ModelTask::SchemaCoercion if page_text(req).contains("\"id\":1") => {
            Ok(r#"[{"id": 1}]"#.to_string())
        }
        _ => scripted(req),
    });
    let out = extractor(&model, ExtractionConfig::default())
        .process_pages(
            pages(&[json!({"lineItems": [{"id": 1}]}), json!({"lineItems": [{"id": 2}]})]),
            None,
        )
        .await
        .unwrap();
    let doc = out.body.as_structured().unwrap();
    assert!(doc.get("id").is_none());
    assert_eq!(doc["lineItems"], json!([{"id": 2}]));
    assert_eq!(out.stats.unparsed_pages, 1);
}
