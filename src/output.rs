//! Result types produced by the extraction pipeline.

use crate::error::PageError;
use crate::pipeline::classify::DocumentType;
use crate::schema::SchemaId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The outcome of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Text returned by the schema-coercion call; may not be valid JSON.
    pub json: String,
    /// Whether `json` parsed as an object and took part in the merge.
    pub parsed: bool,
    pub duration_ms: u64,
    /// Retries spent across both calls.
    pub retries: u32,
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn failed(page_num: usize, duration_ms: u64, retries: u32, error: PageError) -> Self {
        Self {
            page_num,
            json: String::new(),
            parsed: false,
            duration_ms,
            retries,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// The final document: a merged JSON object, or the model's raw text when no
/// page produced parseable JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentBody {
    Structured(Value),
    Raw(String),
}

impl DocumentBody {
    /// Serialise for the response: pretty JSON or the raw text, trimmed.
    pub fn to_text(&self) -> String {
        match self {
            DocumentBody::Structured(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
            DocumentBody::Raw(s) => s.trim().to_string(),
        }
    }

    /// The body as a JSON value; raw text becomes a JSON string.
    pub fn to_value(&self) -> Value {
        match self {
            DocumentBody::Structured(v) => v.clone(),
            DocumentBody::Raw(s) => Value::String(s.trim().to_string()),
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            DocumentBody::Structured(v) => Some(v),
            DocumentBody::Raw(_) => None,
        }
    }
}

/// Timing and page counts for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub total_pages: usize,
    /// Pages whose two model calls both succeeded.
    pub extracted_pages: usize,
    pub failed_pages: usize,
    /// Extracted pages whose output was not a JSON object.
    pub unparsed_pages: usize,
    pub split_duration_ms: u64,
    pub extraction_duration_ms: u64,
    pub verification_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything one extraction run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub body: DocumentBody,
    pub schema: SchemaId,
    /// Classification used for verification; None when nothing was verified.
    pub document_type: Option<DocumentType>,
    /// Copy of the report attached to the body, if verification ran.
    pub report: Option<VerificationReport>,
    pub pages: Vec<PageResult>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Final JSON text with surrounding whitespace trimmed.
    pub fn response_text(&self) -> String {
        self.body.to_text().trim().to_string()
    }
}

// ── Verification report ──────────────────────────────────────────────────

/// How much a discrepancy matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Significance {
    High,
    Medium,
    #[default]
    Low,
}

impl Significance {
    /// Lenient parse; anything unrecognised is `Low`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" => Significance::High,
            "medium" | "moderate" => Significance::Medium,
            _ => Significance::Low,
        }
    }
}

impl<'de> Deserialize<'de> for Significance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Significance::parse(&s),
            _ => Significance::Low,
        })
    }
}

/// One finding of the verification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub expected: Value,
    #[serde(default)]
    pub actual: Value,
    #[serde(default, alias = "corrected")]
    pub correction: Value,
    #[serde(default, alias = "confidence")]
    pub significance: Significance,
}

impl Discrepancy {
    pub fn new(kind: impl Into<String>, significance: Significance) -> Self {
        Self {
            kind: Some(kind.into()),
            location: None,
            expected: Value::Null,
            actual: Value::Null,
            correction: Value::Null,
            significance,
        }
    }
}

/// Structured result of the post-merge verification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    #[serde(alias = "mathVerified", alias = "extractionVerified")]
    pub verified: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub discrepancies: Vec<Discrepancy>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    /// The model's unparsed reply, kept only when parsing failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl VerificationReport {
    /// A failed report carrying the reason in its summary.
    pub fn failed(summary: impl Into<String>) -> Self {
        Self {
            verified: false,
            discrepancies: Vec::new(),
            summary: summary.into(),
            document_type: None,
            raw_response: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
