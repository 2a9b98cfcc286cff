//! Pipeline stages for document extraction.
//!
//! Each submodule implements one transformation step and is testable on its
//! own with [`crate::testing::MockModel`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ extract ×N ──▶ merge ──▶ classify ──▶ verify
//! (URL/path) (pdfium)  (2 calls/page) (deep)   (rules)     (1 call)
//! ```
//!
//! 1. [`input`]   : read a local file or download a URL into memory
//! 2. [`split`]   : one PNG per PDF page, or one unit for anything else;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`extract`] : raw-text call then schema-coercion call, per page
//! 4. [`llm`]     : timeout and retry around every model call
//! 5. [`response`]: strip fences and prose around JSON replies
//! 6. [`merge`]   : fold page objects into one document, first wins
//! 7. [`classify`]: pick the document type that steers verification
//! 8. [`verify`]  : one checking call; the report is attached to the document

pub mod classify;
pub mod extract;
pub mod input;
pub mod llm;
pub mod merge;
pub mod response;
pub mod split;
pub mod verify;
