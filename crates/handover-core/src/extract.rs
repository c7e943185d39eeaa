//! Parsing and heuristics for model output: the note-taker JSON envelope, the
//! knowledge-builder sections envelope, Mermaid extraction, duplicate
//! detection, and insight categorization.

use handover_schema::{AreaKey, CrossReference, KnowledgeSections, SnapshotExtract, Topic};
use serde_json::Value;

use crate::error::{HandoverError, Result};

/// Strip Markdown code fences and cut the response down to the first
/// top-level `{ ... }` block.
fn json_slice(raw: &str) -> Result<&str> {
    let mut cleaned = raw.trim();
    for prefix in ["```json", "```JSON", "```"] {
        if let Some(rest) = cleaned.strip_prefix(prefix) {
            cleaned = rest.trim_start();
            break;
        }
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest.trim_end();
    }

    let start = cleaned
        .find('{')
        .ok_or_else(|| HandoverError::parse("no JSON object found in response"))?;
    let end = cleaned
        .rfind('}')
        .ok_or_else(|| HandoverError::parse("no JSON object found in response"))?;
    if end < start {
        return Err(HandoverError::parse("no JSON object found in response"));
    }
    Ok(&cleaned[start..=end])
}

fn string_array(value: &Value, field: &str) -> Result<Vec<String>> {
    let arr = value
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| HandoverError::parse(format!("missing or invalid field: {field}")))?;
    Ok(arr
        .iter()
        .filter_map(|item| item.as_str().map(str::to_owned))
        .collect())
}

/// Parse the note-taker response into the five-list snapshot envelope.
pub fn parse_note_envelope(raw: &str) -> Result<SnapshotExtract> {
    let value: Value = serde_json::from_str(json_slice(raw)?)
        .map_err(|e| HandoverError::parse(e.to_string()))?;

    Ok(SnapshotExtract {
        topics_covered: string_array(&value, "topicsCovered")?,
        key_insights: string_array(&value, "keyInsights")?,
        frameworks_mentioned: string_array(&value, "frameworksMentioned")?,
        gaps: string_array(&value, "gaps")?,
        suggested_probes: string_array(&value, "suggestedProbes")?,
    })
}

/// Containment-based similarity in [0, 1]. Not true edit distance: equal
/// strings score 1, a large length gap scores 0, and otherwise the score is
/// the length ratio when one string contains the other.
pub fn containment_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let (longer, shorter) = if a.len() > b.len() { (a, b) } else { (b, a) };
    if longer.is_empty() {
        return 1.0;
    }
    if (longer.len() - shorter.len()) as f64 / longer.len() as f64 > 0.5 {
        return 0.0;
    }
    if longer.contains(shorter) {
        return shorter.len() as f64 / longer.len() as f64;
    }
    0.0
}

/// Whether a candidate duplicates any existing (already lower-cased) point.
pub fn is_duplicate(existing: &[String], candidate: &str) -> bool {
    let normalized = candidate.to_lowercase().trim().to_owned();
    existing.iter().any(|prior| {
        prior.contains(&normalized)
            || normalized.contains(prior.as_str())
            || containment_similarity(prior, &normalized) > 0.8
    })
}

/// Categorize an insight into a knowledge area by keyword priority:
/// pitfalls > tips > contacts > systems > dates > tasks > overview, with
/// tips as the fallback.
pub fn categorize_insight(insight: &str) -> AreaKey {
    let lower = insight.to_lowercase();
    let any = |kws: &[&str]| kws.iter().any(|kw| lower.contains(kw));

    if any(&["pitfall", "mistake", "avoid", "careful", "risk"]) {
        AreaKey::Pitfalls
    } else if any(&["tip", "recommend", "best practice", "always", "never"]) {
        AreaKey::Tips
    } else if any(&["contact", "stakeholder", "team", "department"]) {
        AreaKey::Contacts
    } else if any(&["system", "software", "tool", "template"]) {
        AreaKey::Systems
    } else if any(&["deadline", "date", "when", "schedule", "timeline"]) {
        AreaKey::Dates
    } else if any(&["step", "process", "task", "action"]) {
        AreaKey::Tasks
    } else if any(&["overview", "purpose", "why", "important"]) {
        AreaKey::Overview
    } else {
        AreaKey::Tips
    }
}

/// Parsed knowledge-builder response before cross-reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedKnowledgeEntry {
    pub sections: KnowledgeSections,
    pub cross_references: Vec<(String, String)>,
    pub quality_notes: String,
}

fn coerce_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "Not covered in interview".to_owned(),
        Some(other) => other.to_string(),
    }
}

fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(Value::String(s)) => vec![s.clone()],
        Some(other) => vec![other.to_string()],
    }
}

/// Parse the knowledge-builder response. The eight section keys must be
/// present; scalar/array mismatches are coerced rather than rejected.
pub fn parse_knowledge_entry(raw: &str) -> Result<ParsedKnowledgeEntry> {
    let value: Value = serde_json::from_str(json_slice(raw)?)
        .map_err(|e| HandoverError::parse(e.to_string()))?;

    let sections = value
        .get("sections")
        .filter(|s| s.is_object())
        .ok_or_else(|| HandoverError::parse("missing or invalid sections object"))?;

    for key in [
        "overview",
        "frequency",
        "keyTasks",
        "keyDates",
        "contacts",
        "systemsAndTools",
        "watchOutFor",
        "proTips",
    ] {
        if sections.get(key).is_none() {
            return Err(HandoverError::parse(format!("missing section: {key}")));
        }
    }

    let parsed_sections = KnowledgeSections {
        overview: coerce_string(sections.get("overview")),
        frequency: coerce_string(sections.get("frequency")),
        key_tasks: coerce_string_list(sections.get("keyTasks")),
        key_dates: coerce_string_list(sections.get("keyDates")),
        contacts: coerce_string_list(sections.get("contacts")),
        systems_and_tools: coerce_string_list(sections.get("systemsAndTools")),
        watch_out_for: coerce_string_list(sections.get("watchOutFor")),
        pro_tips: coerce_string_list(sections.get("proTips")),
    };

    let cross_references = value
        .get("crossReferences")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(|r| {
                    let name = r.get("topicName")?.as_str()?;
                    let reason = r.get("reason")?.as_str()?;
                    Some((name.to_owned(), reason.to_owned()))
                })
                .collect()
        })
        .unwrap_or_default();

    let quality_notes = value
        .get("qualityNotes")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    Ok(ParsedKnowledgeEntry {
        sections: parsed_sections,
        cross_references,
        quality_notes,
    })
}

/// Match cross-reference names to known topics (case-insensitive, either-way
/// containment) and attach topic ids where found.
pub fn resolve_cross_references(
    refs: Vec<(String, String)>,
    topics: &[Topic],
) -> Vec<CrossReference> {
    refs.into_iter()
        .map(|(name, reason)| {
            let lower = name.to_lowercase();
            let matched = topics.iter().find(|t| {
                let candidate = t.name.to_lowercase();
                candidate == lower || candidate.contains(&lower) || lower.contains(&candidate)
            });
            CrossReference {
                topic_id: matched.map(|t| t.id.clone()),
                topic_name: name,
                reason,
            }
        })
        .collect()
}

/// Quote bracketed node text containing characters Mermaid would choke on.
fn sanitize_mermaid_segments(code: &str, open: char, close: char, bad: &[char]) -> String {
    let mut out = String::with_capacity(code.len());
    let mut rest = code;
    while let Some(start) = rest.find(open) {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        match tail[1..].find(close) {
            Some(offset) => {
                let inner = &tail[1..1 + offset];
                out.push(open);
                if inner.chars().any(|c| bad.contains(&c)) && !inner.starts_with('"') {
                    out.push('"');
                    out.push_str(&inner.replace('"', "'"));
                    out.push('"');
                } else {
                    out.push_str(inner);
                }
                out.push(close);
                rest = &tail[1 + offset + 1..];
            }
            None => {
                out.push_str(tail);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Strip code fences from a workflow response and sanitize node labels.
pub fn extract_mermaid(raw: &str) -> String {
    let mut code = raw.trim();
    for prefix in ["```mermaid", "```"] {
        if let Some(rest) = code.strip_prefix(prefix) {
            code = rest.trim_start_matches('\n');
            break;
        }
    }
    if let Some(rest) = code.strip_suffix("```") {
        code = rest.trim_end().trim_end_matches('\n');
    }

    let sanitized = sanitize_mermaid_segments(code, '[', ']', &['(', ')', '{', '}']);
    sanitize_mermaid_segments(&sanitized, '{', '}', &['(', ')', '[', ']'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use handover_schema::{TopicFrequency, TopicStatus};

    #[test]
    fn parses_bare_envelope() {
        let raw = r#"{"topicsCovered":["month-end"],"keyInsights":["close early"],"frameworksMentioned":[],"gaps":["VAT unclear"],"suggestedProbes":["ask about VAT"]}"#;
        let extract = parse_note_envelope(raw).unwrap();
        assert_eq!(extract.topics_covered, vec!["month-end"]);
        assert_eq!(extract.gaps, vec!["VAT unclear"]);
    }

    #[test]
    fn strips_markdown_fences_and_prose() {
        let raw = "Here you go:\n```json\n{\"topicsCovered\":[],\"keyInsights\":[\"a\"],\"frameworksMentioned\":[],\"gaps\":[],\"suggestedProbes\":[]}\n```\nHope that helps!";
        // Prose before the fence is fine: extraction runs first-{ to last-}.
        let extract = parse_note_envelope(raw).unwrap();
        assert_eq!(extract.key_insights, vec!["a"]);
    }

    #[test]
    fn rejects_response_without_object() {
        let err = parse_note_envelope("no json here").unwrap_err();
        assert!(err.to_string().contains("no JSON object"));
    }

    #[test]
    fn rejects_missing_array_field() {
        let raw = r#"{"topicsCovered":[],"keyInsights":"not an array","frameworksMentioned":[],"gaps":[],"suggestedProbes":[]}"#;
        let err = parse_note_envelope(raw).unwrap_err();
        assert!(err.to_string().contains("keyInsights"));
    }

    #[test]
    fn similarity_handles_equality_containment_and_gap() {
        assert_eq!(containment_similarity("abc", "abc"), 1.0);
        assert_eq!(containment_similarity("abcdefghij", "ab"), 0.0);
        let score = containment_similarity("always reconcile the ledger", "reconcile the ledger");
        assert!(score > 0.7 && score < 1.0);
        assert_eq!(containment_similarity("abcd", "wxyz"), 0.0);
    }

    #[test]
    fn duplicate_detection_uses_containment_both_ways() {
        let existing = vec!["always reconcile the suspense account weekly".to_lowercase()];
        assert!(is_duplicate(&existing, "Reconcile the suspense account weekly"));
        assert!(is_duplicate(
            &existing,
            "always reconcile the suspense account weekly, without fail"
        ));
        assert!(!is_duplicate(&existing, "chase aged debt on Mondays"));
    }

    #[test]
    fn categorization_follows_priority_order() {
        assert_eq!(categorize_insight("Avoid this common mistake"), AreaKey::Pitfalls);
        // "risk" outranks "recommend" because pitfalls are checked first.
        assert_eq!(
            categorize_insight("I recommend assessing the risk first"),
            AreaKey::Pitfalls
        );
        assert_eq!(categorize_insight("Always double-check"), AreaKey::Tips);
        assert_eq!(categorize_insight("Speak to the pensions team"), AreaKey::Contacts);
        assert_eq!(categorize_insight("The Oracle system handles it"), AreaKey::Systems);
        assert_eq!(categorize_insight("The deadline falls mid-month"), AreaKey::Dates);
        assert_eq!(categorize_insight("A three-step process"), AreaKey::Tasks);
        assert_eq!(categorize_insight("The purpose of the account"), AreaKey::Overview);
        assert_eq!(categorize_insight("miscellaneous note"), AreaKey::Tips);
    }

    #[test]
    fn knowledge_entry_requires_all_sections() {
        let raw = r#"{"sections":{"overview":"x","frequency":"monthly","keyTasks":[],"keyDates":[],"contacts":[],"systemsAndTools":[],"watchOutFor":[]}}"#;
        let err = parse_knowledge_entry(raw).unwrap_err();
        assert!(err.to_string().contains("proTips"));
    }

    #[test]
    fn knowledge_entry_coerces_scalars_into_lists() {
        let raw = r#"{"sections":{"overview":"the overview","frequency":"Monthly, day 5","keyTasks":"just one task","keyDates":[],"contacts":[],"systemsAndTools":[],"watchOutFor":[],"proTips":[1,"two"]},"crossReferences":[{"topicName":"Budget Setting","reason":"feeds into it"},{"bad":"ref"}],"qualityNotes":"thin on dates"}"#;
        let parsed = parse_knowledge_entry(raw).unwrap();
        assert_eq!(parsed.sections.key_tasks, vec!["just one task"]);
        assert_eq!(parsed.sections.pro_tips, vec!["1", "two"]);
        assert_eq!(parsed.cross_references.len(), 1);
        assert_eq!(parsed.quality_notes, "thin on dates");
    }

    fn topic(id: &str, name: &str) -> Topic {
        Topic {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            frequency: TopicFrequency::Monthly,
            category: String::new(),
            order: 0,
            status: TopicStatus::Pending,
            knowledge_entry_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cross_references_resolve_by_containment() {
        let topics = vec![topic("t1", "Annual Budget Setting"), topic("t2", "Treasury")];
        let resolved = resolve_cross_references(
            vec![
                ("Budget Setting".into(), "related".into()),
                ("Unknown Topic".into(), "mystery".into()),
            ],
            &topics,
        );
        assert_eq!(resolved[0].topic_id.as_deref(), Some("t1"));
        assert!(resolved[1].topic_id.is_none());
    }

    #[test]
    fn mermaid_extraction_strips_fences() {
        let raw = "```mermaid\nflowchart TD\n    A[Start] --> B[End]\n```";
        let code = extract_mermaid(raw);
        assert!(code.starts_with("flowchart TD"));
        assert!(!code.contains("```"));
    }

    #[test]
    fn mermaid_node_text_with_parens_gets_quoted() {
        let raw = "flowchart TD\n    A[Receive Invoice (PDF)] --> B{Valid (checked)?}";
        let code = extract_mermaid(raw);
        assert!(code.contains("A[\"Receive Invoice (PDF)\"]"));
        assert!(code.contains("B{\"Valid (checked)?\"}"));
    }

    #[test]
    fn mermaid_plain_nodes_left_untouched() {
        let raw = "flowchart TD\n    A[Start] --> B{Approved?}";
        assert_eq!(extract_mermaid(raw), raw);
    }
}
