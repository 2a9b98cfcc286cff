//! Document-type classification for the verification pass.
//!
//! Classification is an ordered rule table, evaluated top to bottom; the
//! first matching rule wins and the fallback is [`DocumentType::Invoice`].
//! Rules on the declared `documentMetadata.documentType` come first, so a
//! document that says what it is beats keyword hits anywhere in its text.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kinds of financial document the verifier knows how to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    PaymentProcessing,
    BankStatement,
    Invoice,
    Receipt,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::PaymentProcessing => "payment_processing",
            DocumentType::BankStatement => "bank_statement",
            DocumentType::Invoice => "invoice",
            DocumentType::Receipt => "receipt",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Matcher {
    /// Normalised `documentMetadata.documentType` equals one of these.
    DeclaredType(&'static [&'static str]),
    /// Lowercased serialised document contains any of these.
    ContainsAny(&'static [&'static str]),
}

struct Rule {
    matcher: Matcher,
    result: DocumentType,
}

static RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::DeclaredType(&[
            "paymentprocessing",
            "paymentprocessingstatement",
            "merchantstatement",
            "merchantprocessingstatement",
            "processingstatement",
        ]),
        result: DocumentType::PaymentProcessing,
    },
    Rule {
        matcher: Matcher::DeclaredType(&["bankstatement", "statement", "accountstatement"]),
        result: DocumentType::BankStatement,
    },
    Rule {
        matcher: Matcher::DeclaredType(&["invoice", "bill"]),
        result: DocumentType::Invoice,
    },
    Rule {
        matcher: Matcher::DeclaredType(&["receipt", "salesreceipt"]),
        result: DocumentType::Receipt,
    },
    Rule {
        matcher: Matcher::ContainsAny(&[
            "interchange",
            "settlement",
            "merchant statement",
            "processing fees",
        ]),
        result: DocumentType::PaymentProcessing,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["routing number", "beginning balance", "ending balance"]),
        result: DocumentType::BankStatement,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["invoice", "bill to"]),
        result: DocumentType::Invoice,
    },
    Rule {
        matcher: Matcher::ContainsAny(&["receipt", "change due"]),
        result: DocumentType::Receipt,
    },
];

/// Lowercase with spaces, underscores and hyphens removed.
fn normalise(s: &str) -> String {
    s.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Classify a merged document.
pub fn classify(doc: &Value) -> DocumentType {
    let declared = doc
        .pointer("/documentMetadata/documentType")
        .and_then(Value::as_str)
        .map(normalise);
    let text = doc.to_string().to_lowercase();

    RULES
        .iter()
        .find(|rule| match rule.matcher {
            Matcher::DeclaredType(names) => declared
                .as_deref()
                .is_some_and(|d| names.contains(&d)),
            Matcher::ContainsAny(needles) => needles.iter().any(|n| text.contains(n)),
        })
        .map(|rule| rule.result)
        .unwrap_or(DocumentType::Invoice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declared_type_beats_keywords() {
        let doc = json!({
            "documentMetadata": {"documentType": "BankStatement"},
            "lineItems": [{"description": "invoice payment"}]
        });
        assert_eq!(classify(&doc), DocumentType::BankStatement);
    }

    #[test]
    fn declared_type_is_normalised() {
        let doc = json!({"documentMetadata": {"documentType": "Merchant Processing_Statement"}});
        assert_eq!(classify(&doc), DocumentType::PaymentProcessing);
        let doc = json!({"documentMetadata": {"documentType": "RECEIPT"}});
        assert_eq!(classify(&doc), DocumentType::Receipt);
    }

    #[test]
    fn keyword_fallbacks_in_rule_order() {
        let doc = json!({"financialData": {"fees": [{"description": "Interchange fees"}]}});
        assert_eq!(classify(&doc), DocumentType::PaymentProcessing);

        let doc = json!({"financialData": {"note": "Ending balance 1,200.00"}});
        assert_eq!(classify(&doc), DocumentType::BankStatement);

        let doc = json!({"additionalData": {"notes": "Thank you! Change due: 0.50"}});
        assert_eq!(classify(&doc), DocumentType::Receipt);
    }

    #[test]
    fn unknown_declared_type_falls_through_to_keywords() {
        let doc = json!({
            "documentMetadata": {"documentType": "other"},
            "additionalData": {"notes": "Bill to: Acme"}
        });
        assert_eq!(classify(&doc), DocumentType::Invoice);
    }

    #[test]
    fn default_is_invoice() {
        assert_eq!(classify(&json!({"x": 1})), DocumentType::Invoice);
    }

    #[test]
    fn serde_and_display_are_snake_case() {
        assert_eq!(
            serde_json::to_value(DocumentType::PaymentProcessing).unwrap(),
            json!("payment_processing")
        );
        assert_eq!(DocumentType::BankStatement.to_string(), "bank_statement");
    }
}
