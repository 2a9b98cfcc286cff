//! Ledger export formats.

use super::model::Transaction;
use super::LedgerError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Xml,
    Qbo,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xml => "xml",
            ExportFormat::Qbo => "qbo",
        }
    }

    /// Render transactions in this format.
    pub fn render(&self, transactions: &[Transaction]) -> Result<String, LedgerError> {
        match self {
            ExportFormat::Csv => to_csv(transactions),
            ExportFormat::Json => to_json(transactions),
            ExportFormat::Xml => Ok(to_xml(transactions)),
            ExportFormat::Qbo => Ok(to_qbo(transactions)),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "xml" => Ok(ExportFormat::Xml),
            "qbo" => Ok(ExportFormat::Qbo),
            _ => Err(LedgerError::UnsupportedExportFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";

pub fn to_csv(transactions: &[Transaction]) -> Result<String, LedgerError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["transaction_date", "amount", "description", "account_code", "category"])?;
    for tx in transactions {
        writer.write_record([
            tx.transaction_date.format(ISO_DATETIME).to_string(),
            tx.amount.to_string(),
            tx.description.clone(),
            tx.account_code.clone(),
            tx.category.clone().unwrap_or_default(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| {
        csv::Error::from(std::io::Error::new(e.error().kind(), e.error().to_string()))
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn to_json(transactions: &[Transaction]) -> Result<String, LedgerError> {
    Ok(serde_json::to_string_pretty(transactions)?)
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

pub fn to_xml(transactions: &[Transaction]) -> String {
    let mut xml = String::from("<Transactions>");
    for tx in transactions {
        xml.push_str("<Transaction>");
        let fields = [
            ("transaction_id", tx.transaction_id.clone()),
            ("transaction_date", tx.transaction_date.format(ISO_DATETIME).to_string()),
            ("amount", tx.amount.to_string()),
            ("description", tx.description.clone()),
            ("account_code", tx.account_code.clone()),
            ("category", tx.category.clone().unwrap_or_default()),
        ];
        for (name, value) in fields {
            xml.push_str(&format!("<{name}>{}</{name}>", escape_xml(&value)));
        }
        xml.push_str("</Transaction>");
    }
    xml.push_str("</Transactions>");
    xml
}

pub fn to_qbo(transactions: &[Transaction]) -> String {
    let mut lines = vec!["!TRNS\tTRNSTYPE\tDATE\tAMOUNT\tNAME\tMEMO".to_string()];
    for tx in transactions {
        lines.push(format!(
            "TRNS\tCHECK\t{}\t{}\t{}\t{}",
            tx.transaction_date.format("%m/%d/%Y"),
            tx.amount,
            tx.description,
            tx.account_code
        ));
    }
    lines.push("ENDTRNS".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::parse::parse_date;

    fn sample() -> Vec<Transaction> {
        let mut tx = Transaction::new(parse_date("2024-03-09").unwrap(), 12.5, "Fish & Chips, large", "6000");
        tx.category = Some("Low Value".into());
        vec![tx]
    }

    #[test]
    fn format_parse_is_case_insensitive() {
        assert_eq!("QBO".parse::<ExportFormat>().unwrap(), ExportFormat::Qbo);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(LedgerError::UnsupportedExportFormat(_))
        ));
    }

    #[test]
    fn csv_has_header_and_quotes_commas() {
        let out = to_csv(&sample()).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("transaction_date,amount,description,account_code,category")
        );
        assert_eq!(
            lines.next(),
            Some("2024-03-09T00:00:00,12.5,\"Fish & Chips, large\",6000,Low Value")
        );
    }

    #[test]
    fn xml_is_escaped() {
        let out = to_xml(&sample());
        assert!(out.starts_with("<Transactions><Transaction>"));
        assert!(out.contains("<description>Fish &amp; Chips, large</description>"));
        assert!(out.ends_with("</Transaction></Transactions>"));
    }

    #[test]
    fn qbo_layout() {
        let out = to_qbo(&sample());
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "!TRNS\tTRNSTYPE\tDATE\tAMOUNT\tNAME\tMEMO");
        assert_eq!(lines[1], "TRNS\tCHECK\t03/09/2024\t12.5\tFish & Chips, large\t6000");
        assert_eq!(lines[2], "ENDTRNS");
    }

    #[test]
    fn json_is_an_array() {
        let out = ExportFormat::Json.render(&sample()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v.as_array().map(Vec::len), Some(1));
    }
}
