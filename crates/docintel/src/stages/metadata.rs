use std::collections::BTreeMap;

use regex::Regex;

use crate::config::FieldPattern;
use crate::error::StageError;

use super::{Stage, StageOutcome};

/// Pattern-based field extraction. The first match of each field's pattern
/// wins; fields without a match are left out of the mapping.
pub struct MetadataExtractor {
    fields: Vec<(String, Regex)>,
    /// First pattern that failed to compile, if any.
    invalid: Option<StageError>,
}

impl MetadataExtractor {
    pub fn new(fields: &[FieldPattern]) -> Self {
        let mut compiled = Vec::with_capacity(fields.len());
        let mut invalid = None;

        for field in fields {
            match Regex::new(&field.pattern) {
                Ok(re) => compiled.push((field.field.clone(), re)),
                Err(e) => {
                    tracing::warn!(field = %field.field, error = %e, "Invalid metadata pattern");
                    invalid.get_or_insert(StageError::InvalidPattern {
                        name: field.field.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Self {
            fields: compiled,
            invalid,
        }
    }

    /// A broken pattern table degrades to an empty mapping.
    pub fn extract(&self, text: &str) -> StageOutcome<BTreeMap<String, String>> {
        if let Some(err) = &self.invalid {
            return StageOutcome::degraded(
                BTreeMap::new(),
                Stage::MetadataExtraction,
                err.to_string(),
            );
        }

        let metadata = self
            .fields
            .iter()
            .filter_map(|(name, re)| {
                re.captures(text)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().trim())
                    .filter(|value| !value.is_empty())
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();

        StageOutcome::ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionRules;

    fn extractor() -> MetadataExtractor {
        MetadataExtractor::new(&ExtractionRules::default().metadata_fields)
    }

    #[test]
    fn test_invoice_line() {
        let outcome = extractor().extract("Invoice #INV-2024-001 dated 15/03/2024 amount ₹5,000.00");
        let metadata = outcome.value;

        assert_eq!(metadata.get("invoice_number").unwrap(), "INV-2024-001");
        assert_eq!(metadata.get("date").unwrap(), "15/03/2024");
        assert_eq!(metadata.get("amount").unwrap(), "5,000.00");
        assert!(!metadata.contains_key("po_number"));
        assert!(!metadata.contains_key("train_number"));
        assert!(outcome.fallback.is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let metadata = extractor()
            .extract("Train 4521 replaced by unit 9001 on 01-02-24")
            .value;
        assert_eq!(metadata.get("train_number").unwrap(), "4521");
        assert_eq!(metadata.get("date").unwrap(), "01-02-24");
    }

    #[test]
    fn test_purchase_order() {
        let metadata = extractor()
            .extract("Purchase Order: PO-7781 for brake pads")
            .value;
        assert_eq!(metadata.get("po_number").unwrap(), "PO-7781");
    }

    #[test]
    fn test_no_matches_gives_empty_mapping() {
        let outcome = extractor().extract("");
        assert!(outcome.value.is_empty());
        assert!(!outcome.is_degraded());
    }

    #[test]
    fn test_invalid_pattern_degrades_to_empty() {
        let extractor = MetadataExtractor::new(&[
            FieldPattern {
                field: "date".to_string(),
                pattern: r"(\d{1,2}/\d{1,2}/\d{4})".to_string(),
            },
            FieldPattern {
                field: "broken".to_string(),
                pattern: "([".to_string(),
            },
        ]);

        let outcome = extractor.extract("Dated 01/01/2024");
        assert!(outcome.value.is_empty());
        let fallback = outcome.fallback.unwrap();
        assert_eq!(fallback.stage, Stage::MetadataExtraction);
        assert!(fallback.reason.contains("broken"));
    }
}
