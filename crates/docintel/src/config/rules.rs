//! Declarative keyword and pattern tables driving the rule-based stages.
//!
//! The built-in [`ExtractionRules::default`] carries the production tables.
//! A YAML file with the same shape can replace any of the four sections;
//! sections left out keep their defaults.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stages::Department;

/// Shared date fragment of the metadata and task patterns (`D/M/YY[YY]`).
const DATE_FRAGMENT: &str = r"(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRules {
    /// Keyword sets in tie-break precedence order.
    #[serde(default = "default_departments")]
    pub departments: Vec<DepartmentKeywords>,

    /// Declared document type to department, consulted when no keyword matched.
    #[serde(default = "default_document_types")]
    pub document_types: Vec<DocumentTypeRoute>,

    #[serde(default = "default_metadata_fields")]
    pub metadata_fields: Vec<FieldPattern>,

    #[serde(default = "default_task_patterns")]
    pub task_patterns: Vec<TaskPattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentKeywords {
    pub department: Department,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTypeRoute {
    pub doc_type: String,
    pub department: Department,
}

/// A named metadata field; capture group 1 of `pattern` is the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPattern {
    pub field: String,
    pub pattern: String,
}

/// A deadline phrase; capture group 1 of `pattern`, when present, is the due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPattern {
    pub pattern: String,
    #[serde(default = "default_task_title")]
    pub title: String,
    #[serde(default = "default_task_kind")]
    pub kind: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            departments: default_departments(),
            document_types: default_document_types(),
            metadata_fields: default_metadata_fields(),
            task_patterns: default_task_patterns(),
        }
    }
}

impl ExtractionRules {
    /// Checks that every pattern compiles and that the tables are coherent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_departments = HashSet::new();
        for entry in &self.departments {
            if entry.department == Department::General {
                return Err(ConfigError::Validation {
                    message: "'general' is the fallback bucket and cannot carry keywords"
                        .to_string(),
                });
            }
            if !seen_departments.insert(entry.department) {
                return Err(ConfigError::Validation {
                    message: format!("department '{}' is listed twice", entry.department),
                });
            }
            if entry.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::Validation {
                    message: format!("department '{}' has an empty keyword", entry.department),
                });
            }
        }

        let mut seen_fields = HashSet::new();
        for field in &self.metadata_fields {
            if !seen_fields.insert(field.field.as_str()) {
                return Err(ConfigError::Validation {
                    message: format!("metadata field '{}' is listed twice", field.field),
                });
            }
            compile_pattern(&field.field, &field.pattern)?;
        }

        for (index, task) in self.task_patterns.iter().enumerate() {
            compile_pattern(&format!("task_patterns[{}]", index), &task.pattern)?;
        }

        Ok(())
    }
}

/// Loads rules from a YAML file and validates them.
pub fn load_rules(path: &Path) -> Result<ExtractionRules, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let rules: ExtractionRules = serde_yaml::from_str(&content)?;
    rules.validate()?;

    tracing::info!(
        departments = rules.departments.len(),
        metadata_fields = rules.metadata_fields.len(),
        task_patterns = rules.task_patterns.len(),
        "Loaded extraction rules"
    );

    Ok(rules)
}

fn compile_pattern(name: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_departments() -> Vec<DepartmentKeywords> {
    vec![
        DepartmentKeywords {
            department: Department::Engineering,
            keywords: keywords(&[
                "maintenance",
                "repair",
                "technical",
                "equipment",
                "train",
                "track",
                "signal",
                "electrical",
                "mechanical",
                "inspection",
                "fault",
            ]),
        },
        DepartmentKeywords {
            department: Department::Hr,
            keywords: keywords(&[
                "employee",
                "staff",
                "training",
                "safety",
                "policy",
                "circular",
                "leave",
                "attendance",
                "performance",
                "recruitment",
            ]),
        },
        DepartmentKeywords {
            department: Department::Finance,
            keywords: keywords(&[
                "invoice", "payment", "budget", "cost", "expense", "purchase", "vendor",
                "contract", "billing", "amount",
            ]),
        },
    ]
}

fn default_document_types() -> Vec<DocumentTypeRoute> {
    [
        ("maintenance", Department::Engineering),
        ("technical", Department::Engineering),
        ("circular", Department::Hr),
        ("policy", Department::Hr),
        ("invoice", Department::Finance),
        ("purchase", Department::Finance),
    ]
    .into_iter()
    .map(|(doc_type, department)| DocumentTypeRoute {
        doc_type: doc_type.to_string(),
        department,
    })
    .collect()
}

fn default_metadata_fields() -> Vec<FieldPattern> {
    [
        ("invoice_number", r"(?i)(?:invoice|inv)[\s#:]*([A-Z0-9-]+)".to_string()),
        ("po_number", r"(?i)(?:po|purchase order)[\s#:]*([A-Z0-9-]+)".to_string()),
        ("train_number", r"(?i)(?:train|unit)[\s#:]*([0-9]+)".to_string()),
        ("amount", r"(?i)(?:amount|total|₹)\s*([0-9,]+(?:\.[0-9]{2})?)".to_string()),
        ("date", DATE_FRAGMENT.to_string()),
    ]
    .into_iter()
    .map(|(field, pattern)| FieldPattern {
        field: field.to_string(),
        pattern,
    })
    .collect()
}

fn default_task_patterns() -> Vec<TaskPattern> {
    [
        format!(
            r"(?i)(?:must|required|mandatory|compliance|acknowledge|confirm).*?(?:by|before)\s*{}",
            DATE_FRAGMENT
        ),
        format!(r"(?i)(?:deadline|due date|submit by)\s*{}", DATE_FRAGMENT),
        format!(
            r"(?i)(?:action required|please|kindly).*?(?:by|before)\s*{}",
            DATE_FRAGMENT
        ),
    ]
    .into_iter()
    .map(|pattern| TaskPattern {
        pattern,
        title: default_task_title(),
        kind: default_task_kind(),
    })
    .collect()
}

fn default_task_title() -> String {
    "Compliance Task".to_string()
}

fn default_task_kind() -> String {
    "compliance".to_string()
}
