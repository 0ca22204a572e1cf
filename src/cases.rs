//! Declarative YAML translation fixtures

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// One input/expected pair. Exactly one expectation form per case: either
/// `expected` (exact, whitespace-trimmed match) or a non-empty `contains`
/// list (every fragment must appear in the output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationCase {
    /// Unique case identifier, used in reports and screenshot names
    pub id: String,

    /// Singlish text typed into the input field
    pub input: String,

    /// Exact Sinhala output, compared trimmed
    #[serde(default)]
    pub expected: Option<String>,

    /// Fragments the output must contain
    #[serde(default)]
    pub contains: Vec<String>,
}

/// How a case's output is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation<'a> {
    Exact(&'a str),
    Contains(&'a [String]),
}

impl TranslationCase {
    pub fn expectation(&self) -> Expectation<'_> {
        match &self.expected {
            Some(text) => Expectation::Exact(text),
            None => Expectation::Contains(&self.contains),
        }
    }
}

/// A named set of translation cases parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSet {
    /// Unique name for this set
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering sets
    #[serde(default)]
    pub tags: Vec<String>,

    /// Cases to run in order
    pub cases: Vec<TranslationCase>,
}

impl CaseSet {
    /// Parse a case set from a YAML string and validate it
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let set: Self = serde_yaml::from_str(yaml)?;
        set.validate()?;
        Ok(set)
    }

    /// Parse a case set from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all case sets from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut sets = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let set = Self::from_file(entry.path())?;
            sets.push(set);
        }

        Ok(sets)
    }

    /// Filter sets by tag
    pub fn filter_by_tag<'a>(sets: &'a [Self], tag: &str) -> Vec<&'a Self> {
        sets.iter().filter(|s| s.tags.contains(&tag.to_string())).collect()
    }

    /// Check ids are unique and every case carries exactly one expectation
    /// form.
    pub fn validate(&self) -> E2eResult<()> {
        let mut seen = HashSet::new();
        for case in &self.cases {
            if !seen.insert(case.id.as_str()) {
                return Err(E2eError::Fixture(format!(
                    "{}: duplicate case id {}",
                    self.name, case.id
                )));
            }
            match (&case.expected, case.contains.is_empty()) {
                (Some(_), false) => {
                    return Err(E2eError::Fixture(format!(
                        "{}: case {} has both expected and contains",
                        self.name, case.id
                    )))
                }
                (None, true) => {
                    return Err(E2eError::Fixture(format!(
                        "{}: case {} has no expectation",
                        self.name, case.id
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }
}
