//! Prompts for every model call the pipeline makes.
//!
//! Keeping the prompt text here means prompt changes never touch the
//! retry, merge or verification code, and tests can inspect prompts
//! without a live model.

use crate::config::VerificationMode;
use crate::pipeline::classify::DocumentType;
use crate::schema::{Schema, SchemaId};

/// Instruction for the first per-page call: faithful free-text transcription.
pub const RAW_TEXT_PROMPT: &str = r#"You are an expert OCR engine for financial documents.

Transcribe this page completely. Describe every row and column exactly as it appears:
- Keep every number, date, currency symbol, sign and decimal place as printed
- For tables, output one line per row with the column values in order, separated by " | "
- Include headers, footers, stamps, handwritten notes and checkbox states
- Do not summarise, correct, reorder or interpret anything
- If a value is illegible, write [illegible]

Output only the transcription."#;

/// Build the schema-coercion prompt for one page's raw text.
pub fn coercion_prompt(schema: &Schema, raw_text: &str) -> String {
    let focus = match schema.id {
        SchemaId::Generic => {
            "Identify the document type (invoice, receipt, bank statement, payment processing \
statement, or other) and record it in documentMetadata.documentType. Every transaction, \
charge, deposit or item row belongs in lineItems."
        }
        SchemaId::Form1040 | SchemaId::Form2848 | SchemaId::Form8821 | SchemaId::Form941 => {
            "Map each numbered form line to its field. Use the line number printed on the form \
to decide where a value belongs; do not infer values for blank lines."
        }
        SchemaId::Payroll => {
            "Record one entry per employee and pay period. Keep gross pay, each deduction and \
net pay as separate numeric fields."
        }
    };

    format!(
        "Convert the following text, transcribed from one page of a {description}, into JSON \
matching this schema exactly.\n\n\
{focus}\n\n\
Rules:\n\
- Use null for any field that does not appear on this page; never guess\n\
- Numbers must be JSON numbers without currency symbols or thousands separators\n\
- Dates must be ISO 8601 (YYYY-MM-DD)\n\
- Keep line items in the order they appear\n\
- Do not add a verification section\n\n\
SCHEMA:\n{schema}\n\n\
PAGE TEXT:\n\"\"\"\n{raw_text}\n\"\"\"",
        description = schema.id.description(),
        focus = focus,
        schema = schema.body,
        raw_text = raw_text,
    )
}

const MATH_REPORT_SHAPE: &str = r#"{
  "verified": true | false,
  "discrepancies": [
    {
      "type": "line_item_total" | "subtotal" | "tax" | "total" | "balance" | "other",
      "location": "where in the document",
      "expected": <number or string>,
      "actual": <number or string as printed>,
      "correction": <number or string>,
      "significance": "High" | "Medium" | "Low"
    }
  ],
  "summary": "one or two sentences"
}"#;

/// Build the verification prompt for a merged document.
pub fn verification_prompt(
    mode: VerificationMode,
    document_type: DocumentType,
    document_json: &str,
) -> String {
    let task = match mode {
        VerificationMode::Math => {
            "Check the arithmetic of this extracted document. Recompute every derived value \
and report each place where the document's value differs from the recomputed one."
        }
        VerificationMode::Extraction => {
            "Check the accuracy of this extraction. Report fields whose values are implausible, \
internally inconsistent, in the wrong field, or obviously misread (for example swapped \
digits, wrong dates, missing decimal points)."
        }
    };

    let emphasis = match document_type {
        DocumentType::PaymentProcessing => {
            "This is a payment processing (merchant) statement. Line items are individual \
fees, card-brand summaries and deposits; they are NOT expected to sum to a single total. \
Check that each fee equals rate × volume where both are given, that fee subtotals match \
their components, and that net deposits equal gross sales minus fees and adjustments."
        }
        DocumentType::BankStatement => {
            "This is a bank statement. Check that beginning balance + deposits − withdrawals \
= ending balance, and that any running balance column is consistent row to row."
        }
        DocumentType::Invoice => {
            "This is an invoice. Check quantity × unit price for each line item, that line \
items sum to the subtotal, and that subtotal + tax + shipping − discounts = total."
        }
        DocumentType::Receipt => {
            "This is a receipt. Check that item amounts sum to the subtotal, that tax is \
consistent with the stated rate, and that total − amount tendered = change."
        }
    };

    format!(
        "{task}\n\n{emphasis}\n\n\
Ignore rounding differences of one cent. Rate each discrepancy High if it changes an amount \
owed or paid, Medium if it affects an intermediate figure, Low otherwise.\n\n\
Return ONLY a JSON object of this shape:\n{shape}\n\n\
DOCUMENT:\n{document_json}",
        task = task,
        emphasis = emphasis,
        shape = MATH_REPORT_SHAPE,
        document_json = document_json,
    )
}

/// Build the vendor-research prompt.
pub fn vendor_research_prompt(vendor_name: &str) -> String {
    format!(
        "Provide a concise business profile of the vendor \"{vendor_name}\" for an accountant \
categorising an expense. Include: what the business does, its industry, the most likely \
expense category for a purchase from it, and any common alternate names that appear on \
bank statements. If you do not recognise the vendor, say so plainly instead of guessing."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_text_prompt_demands_exact_rows() {
        assert!(RAW_TEXT_PROMPT.contains("every row and column exactly as it appears"));
    }

    #[test]
    fn coercion_prompt_embeds_schema_and_text() {
        let prompt = coercion_prompt(&Schema::generic(), "INVOICE #42 | total 100.00");
        assert!(prompt.contains("INVOICE #42 | total 100.00"));
        assert!(prompt.contains("\"lineItems\""));
        assert!(prompt.contains("documentMetadata.documentType"));
    }

    #[test]
    fn payment_processing_suppresses_sum_to_total() {
        let prompt = verification_prompt(
            VerificationMode::Math,
            DocumentType::PaymentProcessing,
            "{}",
        );
        assert!(prompt.contains("NOT expected to sum"));
        let invoice = verification_prompt(VerificationMode::Math, DocumentType::Invoice, "{}");
        assert!(!invoice.contains("NOT expected to sum"));
    }

    #[test]
    fn extraction_mode_changes_task() {
        let prompt =
            verification_prompt(VerificationMode::Extraction, DocumentType::Receipt, "{}");
        assert!(prompt.contains("accuracy of this extraction"));
    }
}
