//! Named extraction schemas.
//!
//! A schema is the JSON shape the coercion call asks the model to fill in.
//! A small fixed set of identifiers is recognised; each maps to
//! `<schema_dir>/<id>.json`. Unknown identifiers, missing files and files
//! that are not valid JSON all fall back to the embedded generic schema, so
//! the extractor always has something to coerce into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Embedded generic financial-document schema.
pub const GENERIC_SCHEMA: &str = r#"{
  "documentMetadata": {
    "documentType": null,
    "documentNumber": null,
    "documentDate": null,
    "dueDate": null,
    "currency": null,
    "language": null,
    "pageCount": null,
    "referenceNumbers": [],
    "fileInfo": { "OCRProcessed": false, "handwritingDetected": false }
  },
  "financialData": {
    "subtotal": null,
    "taxAmount": null,
    "taxRate": null,
    "discountAmount": null,
    "shippingAmount": null,
    "totalAmount": null,
    "amountPaid": null,
    "balanceDue": null,
    "currency": null,
    "beginningBalance": null,
    "endingBalance": null,
    "fees": []
  },
  "lineItems": [
    {
      "lineNumber": null,
      "date": null,
      "description": null,
      "quantity": null,
      "unitPrice": null,
      "amount": null,
      "taxAmount": null,
      "category": null,
      "accountCode": null
    }
  ],
  "partyInformation": {
    "vendor": { "name": null, "address": null, "contact": null, "taxID": null },
    "customer": { "name": null, "address": null, "contact": null, "accountNumber": null },
    "bank": { "name": null, "routingNumber": null, "accountNumber": null }
  },
  "paymentInformation": {
    "paymentMethod": null,
    "paymentTerms": null,
    "paymentDate": null,
    "transactionId": null,
    "cardLastFour": null,
    "isPaid": false
  },
  "fixedAssetData": {
    "assets": [
      {
        "description": null,
        "acquisitionDate": null,
        "cost": null,
        "usefulLifeYears": null,
        "depreciationMethod": null
      }
    ]
  },
  "additionalData": {
    "notes": null,
    "attachments": [],
    "auditTrail": []
  }
}"#;

/// Recognised schema identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemaId {
    #[default]
    Generic,
    Form1040,
    Form2848,
    Form8821,
    Form941,
    Payroll,
}

impl SchemaId {
    pub const ALL: [SchemaId; 6] = [
        SchemaId::Generic,
        SchemaId::Form1040,
        SchemaId::Form2848,
        SchemaId::Form8821,
        SchemaId::Form941,
        SchemaId::Payroll,
    ];

    /// The identifier used on the wire and as the file stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaId::Generic => "generic",
            SchemaId::Form1040 => "1040",
            SchemaId::Form2848 => "2848",
            SchemaId::Form8821 => "8821",
            SchemaId::Form941 => "941",
            SchemaId::Payroll => "payroll",
        }
    }

    /// Human-readable document description used in prompts.
    pub fn description(&self) -> &'static str {
        match self {
            SchemaId::Generic => "financial document (invoice, receipt, bank or processing statement)",
            SchemaId::Form1040 => "IRS Form 1040 U.S. Individual Income Tax Return",
            SchemaId::Form2848 => "IRS Form 2848 Power of Attorney and Declaration of Representative",
            SchemaId::Form8821 => "IRS Form 8821 Tax Information Authorization",
            SchemaId::Form941 => "IRS Form 941 Employer's Quarterly Federal Tax Return",
            SchemaId::Payroll => "payroll register or pay stub",
        }
    }

    /// Resolve an optional caller-supplied name; anything unrecognised is generic.
    pub fn resolve(name: Option<&str>) -> Self {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return SchemaId::Generic;
        };
        let lower = name.to_ascii_lowercase();
        let stem = lower.strip_prefix("form").map(str::trim).unwrap_or(&lower);
        SchemaId::ALL
            .into_iter()
            .find(|id| id.as_str() == stem)
            .unwrap_or_else(|| {
                debug!("Unknown schema '{}', using generic", name);
                SchemaId::Generic
            })
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A loaded schema: its identifier and the JSON text shown to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub id: SchemaId,
    pub body: String,
}

impl Schema {
    /// The embedded generic schema.
    pub fn generic() -> Self {
        Self {
            id: SchemaId::Generic,
            body: GENERIC_SCHEMA.to_string(),
        }
    }
}

/// Loads schemas by name from an optional on-disk directory.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    dir: Option<PathBuf>,
}

impl SchemaRegistry {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Load the schema for a caller-supplied name.
    pub async fn load(&self, name: Option<&str>) -> Schema {
        let id = SchemaId::resolve(name);
        if id == SchemaId::Generic {
            if let Some(schema) = self.read_file(SchemaId::Generic).await {
                return schema;
            }
            return Schema::generic();
        }

        match self.read_file(id).await {
            Some(schema) => schema,
            None => {
                warn!("Schema '{}' unavailable, falling back to generic", id);
                Schema::generic()
            }
        }
    }

    async fn read_file(&self, id: SchemaId) -> Option<Schema> {
        let path = self.dir.as_ref()?.join(format!("{}.json", id.as_str()));
        let body = match tokio::fs::read_to_string(&path).await {
            Ok(body) => body,
            Err(e) => {
                debug!("Schema file {} not readable: {}", path.display(), e);
                return None;
            }
        };
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&body) {
            warn!("Schema file {} is not valid JSON: {}", path.display(), e);
            return None;
        }
        debug!("Loaded schema '{}' from {}", id, path.display());
        Some(Schema { id, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_generic_schema_is_valid_json() {
        let v: serde_json::Value = serde_json::from_str(GENERIC_SCHEMA).unwrap();
        for key in [
            "documentMetadata",
            "financialData",
            "lineItems",
            "partyInformation",
            "paymentInformation",
            "fixedAssetData",
            "additionalData",
        ] {
            assert!(v.get(key).is_some(), "missing top-level key {key}");
        }
    }

    #[test]
    fn resolve_names() {
        assert_eq!(SchemaId::resolve(None), SchemaId::Generic);
        assert_eq!(SchemaId::resolve(Some("")), SchemaId::Generic);
        assert_eq!(SchemaId::resolve(Some("1040")), SchemaId::Form1040);
        assert_eq!(SchemaId::resolve(Some("Form 941")), SchemaId::Form941);
        assert_eq!(SchemaId::resolve(Some("PAYROLL")), SchemaId::Payroll);
        assert_eq!(SchemaId::resolve(Some("w2")), SchemaId::Generic);
    }

    #[tokio::test]
    async fn missing_dir_falls_back_to_generic() {
        let registry = SchemaRegistry::default();
        assert_eq!(registry.load(Some("1040")).await, Schema::generic());
    }

    #[tokio::test]
    async fn loads_named_schema_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("941.json"), r#"{"quarter": null}"#).unwrap();
        std::fs::write(dir.path().join("payroll.json"), "not json").unwrap();

        let registry = SchemaRegistry::new(Some(dir.path().to_path_buf()));
        let schema = registry.load(Some("941")).await;
        assert_eq!(schema.id, SchemaId::Form941);
        assert!(schema.body.contains("quarter"));

        // Invalid JSON on disk falls back to the embedded schema.
        assert_eq!(registry.load(Some("payroll")).await, Schema::generic());
    }
}
