pub mod rules;
pub mod settings;

pub use rules::{
    load_rules, DepartmentKeywords, DocumentTypeRoute, ExtractionRules, FieldPattern, TaskPattern,
};
pub use settings::{LedgerBackend, LogFormat, Settings, StorageSettings, SummarizerSettings};
