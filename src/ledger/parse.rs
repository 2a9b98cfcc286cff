//! Building transactions from uploads and extracted documents.

use super::model::Transaction;
use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde_json::Value;
use tracing::debug;

/// Parse a date as `%Y-%m-%d`, or a full ISO datetime.
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse `date,amount,description,account_code` lines.
///
/// Lines with fewer than four fields, an unparseable date or amount, or
/// broken quoting are skipped.
pub fn parse_delimited(bytes: &[u8]) -> Vec<Transaction> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut out = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let Ok(record) = record else {
            debug!("Skipping unreadable line {}", line + 1);
            continue;
        };
        if record.len() < 4 {
            continue;
        }
        let (Some(date), Ok(amount)) = (parse_date(&record[0]), record[1].parse::<f64>()) else {
            debug!("Skipping line {}: bad date or amount", line + 1);
            continue;
        };
        out.push(Transaction::new(date, amount, &record[2], &record[3]));
    }
    out
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .ok(),
        _ => None,
    }
}

fn text<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Best-effort mapping of a document's `lineItems` to transactions.
///
/// Items without an amount are skipped. An item's own date wins; otherwise
/// the document date is used, and items with neither are skipped.
pub fn transactions_from_document(doc: &Value) -> Vec<Transaction> {
    let doc_date = doc
        .pointer("/documentMetadata/documentDate")
        .and_then(Value::as_str)
        .and_then(parse_date);

    let Some(items) = doc.get("lineItems").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let amount = item.get("amount").and_then(number)?;
            let date = text(item, &["date", "transactionDate"])
                .and_then(parse_date)
                .or(doc_date)?;
            let description = text(item, &["description", "name"]).unwrap_or_default();
            let account_code = text(item, &["accountCode", "category"]).unwrap_or_default();
            Some(Transaction::new(date, amount, description, account_code))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_lines_and_skips_bad_ones() {
        let input = b"2024-01-05, 12.50, Coffee, 6000\n\
not-a-date,1,x,y\n\
2024-01-06,abc,Lunch,6000\n\
2024-01-07,250,Printer\n\
2024-01-08,250.00,\"Office chair, ergonomic\",1500,extra\n";
        let txs = parse_delimited(input);
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].amount, 12.5);
        assert_eq!(txs[0].description, "Coffee");
        assert_eq!(txs[0].account_code, "6000");
        assert_eq!(txs[1].description, "Office chair, ergonomic");
    }

    #[test]
    fn line_items_use_document_date_fallback() {
        let doc = json!({
            "documentMetadata": {"documentDate": "2024-02-01"},
            "lineItems": [
                {"description": "Widget", "amount": 40, "accountCode": "5000"},
                {"description": "Gadget", "amount": "$1,250.00", "date": "2024-02-03"},
                {"description": "No amount", "amount": null}
            ]
        });
        let txs = transactions_from_document(&doc);
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].transaction_date, parse_date("2024-02-01").unwrap());
        assert_eq!(txs[0].account_code, "5000");
        assert_eq!(txs[1].amount, 1250.0);
        assert_eq!(txs[1].transaction_date, parse_date("2024-02-03").unwrap());
    }

    #[test]
    fn items_without_any_date_are_skipped() {
        let doc = json!({"lineItems": [{"description": "x", "amount": 1}]});
        assert!(transactions_from_document(&doc).is_empty());
    }
}
