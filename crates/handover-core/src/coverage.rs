//! Keyword-based coverage estimation.
//!
//! A deliberately cheap heuristic, not semantic understanding: incidental
//! keyword co-occurrence can produce false positives. The strategy trait
//! exists so a real similarity-based implementation can be swapped in without
//! touching the interview lifecycle.

use handover_schema::{AreaKey, CoverageMap, Message};

pub trait CoverageStrategy: Send + Sync {
    /// Estimate which knowledge areas a transcript has covered. Re-running on
    /// a longer transcript never removes coverage.
    fn analyse(&self, messages: &[Message]) -> CoverageMap;
}

const INDICATORS: [(AreaKey, &[&str]); 8] = [
    (
        AreaKey::Overview,
        &["what it is", "purpose", "why we do", "objective", "goal", "overview", "about this"],
    ),
    (
        AreaKey::Tasks,
        &["steps", "process", "how to", "procedure", "workflow", "first", "then", "finally", "task"],
    ),
    (
        AreaKey::Dates,
        &["deadline", "due date", "by when", "timeline", "schedule", "day", "month", "week", "annual"],
    ),
    (
        AreaKey::Contacts,
        &["who", "contact", "team", "department", "speak to", "liaise", "coordinate", "person"],
    ),
    (
        AreaKey::Systems,
        &["system", "software", "tool", "application", "spreadsheet", "template", "oracle", "sap"],
    ),
    (
        AreaKey::Pitfalls,
        &["mistake", "error", "wrong", "avoid", "careful", "risk", "problem", "issue", "watch out"],
    ),
    (
        AreaKey::Tips,
        &["tip", "advice", "recommend", "suggest", "trick", "shortcut", "easier", "better way"],
    ),
    (
        AreaKey::Related,
        &["connect", "related", "link", "depend", "affect", "other area", "knock-on"],
    ),
];

/// Marks an area covered when at least `min_matches` distinct keywords from
/// its indicator list appear anywhere in the concatenated transcript.
pub struct KeywordCoverage {
    min_matches: usize,
}

impl KeywordCoverage {
    pub fn new() -> Self {
        Self { min_matches: 2 }
    }
}

impl Default for KeywordCoverage {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageStrategy for KeywordCoverage {
    fn analyse(&self, messages: &[Message]) -> CoverageMap {
        let mut coverage = CoverageMap::new();
        if messages.is_empty() {
            return coverage;
        }

        let transcript = messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        for (area, keywords) in INDICATORS {
            let matches = keywords.iter().filter(|kw| transcript.contains(*kw)).count();
            if matches >= self.min_matches {
                coverage.insert(area, true);
            }
        }

        coverage
    }
}
