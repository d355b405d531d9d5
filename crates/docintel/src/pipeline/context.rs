use std::collections::BTreeMap;

use crate::ledger::JobInput;
use crate::stages::{Department, Fallback, Language, Task};

/// Working state of one pipeline run; each step fills its slot.
pub struct PipelineContext {
    pub input: JobInput,

    // Step 1 result
    pub bytes: Option<Vec<u8>>,

    // Step 2 result, guaranteed Some once extraction succeeded
    pub raw_text: Option<String>,

    pub language: Option<Language>,
    pub summary: BTreeMap<Language, String>,
    pub metadata: BTreeMap<String, String>,
    pub department: Option<Department>,
    pub tasks: Vec<Task>,

    pub fallbacks: Vec<Fallback>,
}

impl PipelineContext {
    pub fn new(input: JobInput) -> Self {
        Self {
            input,
            bytes: None,
            raw_text: None,
            language: None,
            summary: BTreeMap::new(),
            metadata: BTreeMap::new(),
            department: None,
            tasks: Vec::new(),
            fallbacks: Vec::new(),
        }
    }

    pub fn raw_text(&self) -> &str {
        self.raw_text.as_deref().unwrap_or_default()
    }

    pub fn summary_in(&self, language: Language) -> &str {
        self.summary
            .get(&language)
            .map(String::as_str)
            .unwrap_or_default()
    }
}
