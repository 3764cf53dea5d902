// src/classify.rs
//! Severity classification: first configured hazard level whose title
//! matches the text wins.

use regex::Regex;
use thiserror::Error;

use crate::store::Store;
use crate::types::HazardSeverity;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("hazard level with empty title")]
    EmptyTitle,
    #[error("invalid hazard level pattern {title:?}: {source}")]
    InvalidPattern {
        title: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SeverityClassifier {
    rules: Vec<(Regex, HazardSeverity)>,
}

impl SeverityClassifier {
    /// Compile severities in the given order. Titles are regex patterns.
    pub fn new(severities: Vec<HazardSeverity>) -> Result<Self, ClassifierError> {
        let mut rules = Vec::with_capacity(severities.len());
        for sev in severities {
            if sev.title.trim().is_empty() {
                return Err(ClassifierError::EmptyTitle);
            }
            let re = Regex::new(&sev.title).map_err(|source| ClassifierError::InvalidPattern {
                title: sev.title.clone(),
                source,
            })?;
            rules.push((re, sev));
        }
        Ok(Self { rules })
    }

    /// Build from the store. An unreachable store yields an empty classifier
    /// (everything is unclassified this cycle); a bad pattern is an error.
    pub async fn load(store: &dyn Store) -> Result<Self, ClassifierError> {
        match store.severities().await {
            Ok(list) => Self::new(list),
            Err(e) => {
                tracing::warn!(error = %e, "hazard levels unavailable; classifier is empty");
                Ok(Self::default())
            }
        }
    }

    pub fn classify(&self, text: &str) -> Option<&HazardSeverity> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(text))
            .map(|(_, sev)| sev)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
