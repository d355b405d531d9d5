use serde::{Deserialize, Serialize};

use crate::config::{DepartmentKeywords, DocumentTypeRoute};

use super::{Stage, StageOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Engineering,
    Hr,
    Finance,
    General,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Engineering => "engineering",
            Self::Hr => "hr",
            Self::Finance => "finance",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword-presence classifier.
///
/// Each keyword found anywhere in the (lower-cased) text adds one point to
/// its department, however often it occurs. The highest score wins and
/// earlier departments win ties. Text without any keyword is routed by its
/// declared document type, then to [`Department::General`].
pub struct DepartmentClassifier {
    departments: Vec<(Department, Vec<String>)>,
    document_types: Vec<(String, Department)>,
}

impl DepartmentClassifier {
    pub fn new(departments: &[DepartmentKeywords], document_types: &[DocumentTypeRoute]) -> Self {
        Self {
            departments: departments
                .iter()
                .map(|d| {
                    (
                        d.department,
                        d.keywords.iter().map(|k| k.to_lowercase()).collect(),
                    )
                })
                .collect(),
            document_types: document_types
                .iter()
                .map(|r| (r.doc_type.trim().to_lowercase(), r.department))
                .collect(),
        }
    }

    pub fn scores(&self, text: &str) -> Vec<(Department, usize)> {
        let haystack = text.to_lowercase();
        self.departments
            .iter()
            .map(|(department, keywords)| {
                let score = keywords
                    .iter()
                    .filter(|k| haystack.contains(k.as_str()))
                    .count();
                (*department, score)
            })
            .collect()
    }

    pub fn classify(
        &self,
        raw_text: &str,
        summary: &str,
        doc_type: Option<&str>,
    ) -> StageOutcome<Department> {
        let combined = format!("{}\n{}", raw_text, summary);

        let mut best: Option<(Department, usize)> = None;
        for (department, score) in self.scores(&combined) {
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((department, score));
            }
        }

        if let Some((department, score)) = best {
            tracing::debug!(department = %department, score, "Classified by keywords");
            return StageOutcome::ok(department);
        }

        let declared = doc_type
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let routed = declared.as_deref().and_then(|t| {
            self.document_types
                .iter()
                .find(|(doc_type, _)| doc_type == t)
                .map(|(_, department)| *department)
        });

        match (routed, declared) {
            (Some(department), Some(t)) => StageOutcome::degraded(
                department,
                Stage::DepartmentClassification,
                format!("no department keywords matched; routed by document type '{}'", t),
            ),
            (_, Some(t)) => StageOutcome::degraded(
                Department::General,
                Stage::DepartmentClassification,
                format!("no department keywords matched and document type '{}' is unmapped", t),
            ),
            (_, None) => StageOutcome::degraded(
                Department::General,
                Stage::DepartmentClassification,
                "no department keywords matched and no document type declared",
            ),
        }
    }
}
