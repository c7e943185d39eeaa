//! QA evaluation: run scenarios against personas, record human scores, and
//! aggregate the results.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use handover_provider::{ChatRequest, LlmClient};
use handover_schema::{Evaluation, EvaluationStatus, Persona, Scenario, Scores};
use handover_store::{DocumentStore, DocumentStoreExt};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::RoleCatalog;
use crate::error::{HandoverError, Result, StoreErrExt};

/// Mean score below which a persona needs calibration or a scenario is
/// flagged problematic.
pub const LOW_SCORE_THRESHOLD: f64 = 3.5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub evaluation_id: String,
    pub persona_id: String,
    pub scenario_id: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreOutcome {
    pub evaluation_id: String,
    pub scores: Scores,
    pub status: EvaluationStatus,
    pub evaluated_at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AverageScores {
    pub accuracy: f64,
    pub tone: f64,
    pub actionability: f64,
    pub risk_awareness: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioBreakdown {
    pub scenario_id: String,
    pub scenario_title: String,
    pub evaluation_count: usize,
    pub average_scores: AverageScores,
    pub needs_attention: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaAnalytics {
    pub persona_id: String,
    pub persona_role: Option<String>,
    pub version: u32,
    pub total_evaluations: usize,
    pub average_scores: AverageScores,
    pub needs_calibration: bool,
    pub calibration_threshold: f64,
    pub scenario_evaluations: Vec<ScenarioBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioAnalyticsRow {
    pub scenario_id: String,
    pub scenario_title: String,
    pub evaluation_count: usize,
    pub personas_evaluated: usize,
    pub average_scores: AverageScores,
    pub is_problematic: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioAnalytics {
    pub total_scenarios: usize,
    pub total_evaluations: usize,
    pub problematic_scenarios: usize,
    pub threshold: f64,
    pub scenarios: Vec<ScenarioAnalyticsRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaStat {
    pub persona_id: String,
    pub persona_role: Option<String>,
    pub version: u32,
    pub evaluation_count: usize,
    pub average_scores: AverageScores,
    pub needs_calibration: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QaSummary {
    pub total_evaluations: usize,
    pub total_personas_evaluated: usize,
    pub total_scenarios_used: usize,
    pub overall_average_score: f64,
    pub threshold: f64,
    pub overall_averages: AverageScores,
    pub flagged_personas: Vec<PersonaStat>,
    pub problematic_scenarios: Vec<ScenarioAnalyticsRow>,
    pub persona_stats: Vec<PersonaStat>,
}

pub struct QaService {
    store: Arc<dyn DocumentStore>,
    llm: Arc<dyn LlmClient>,
    catalog: Arc<RoleCatalog>,
    model: String,
}

impl QaService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LlmClient>,
        catalog: Arc<RoleCatalog>,
        model: String,
    ) -> Self {
        Self {
            store,
            llm,
            catalog,
            model,
        }
    }

    pub async fn scenarios_for_role(&self, role: &str) -> Result<Vec<Scenario>> {
        if !self.catalog.contains(role) {
            return Err(HandoverError::validation(format!(
                "Invalid role. Must be one of: {}",
                self.catalog.role_names().join(", ")
            )));
        }
        let slug = RoleCatalog::slug(role);
        self.store
            .get_all(&format!("scenarios/{slug}"))
            .await
            .store_err()
    }

    async fn find_scenario(&self, scenario_id: &str) -> Result<Scenario> {
        for role in self.catalog.role_names() {
            let slug = RoleCatalog::slug(role);
            if let Some(scenario) = self
                .store
                .get::<Scenario>(&format!("scenarios/{slug}/{scenario_id}"))
                .await
                .store_err()?
            {
                return Ok(scenario);
            }
        }
        Err(HandoverError::not_found("Scenario", scenario_id))
    }

    /// Run a scenario against a persona and record a pending evaluation.
    pub async fn run(&self, persona_id: &str, scenario_id: &str) -> Result<RunOutcome> {
        let persona: Persona = self
            .store
            .get(&format!("personas/{persona_id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Persona", persona_id))?;
        let scenario = self.find_scenario(scenario_id).await?;

        let question = format!(
            "Context: {}\n\nQuestion: {}",
            scenario.context, scenario.question
        );

        let response = self
            .llm
            .chat(ChatRequest::simple(
                self.model.clone(),
                Some(persona.prompt_text.clone()),
                question.clone(),
            ))
            .await
            .map_err(HandoverError::upstream)?;

        let evaluation = Evaluation {
            id: Uuid::new_v4().to_string(),
            persona_id: persona_id.to_owned(),
            persona_role: persona.role.clone(),
            persona_version: persona.version,
            scenario_id: scenario_id.to_owned(),
            scenario_title: scenario.title.clone(),
            question,
            response: response.text.clone(),
            status: EvaluationStatus::Pending,
            scores: None,
            comments: None,
            evaluated_at: None,
            created_at: Utc::now(),
        };
        self.store
            .put(&format!("evaluations/{}", evaluation.id), &evaluation)
            .await
            .store_err()?;

        Ok(RunOutcome {
            evaluation_id: evaluation.id,
            persona_id: persona_id.to_owned(),
            scenario_id: scenario_id.to_owned(),
            response: response.text,
        })
    }

    /// Record reviewer scores. Each dimension must be an integer in 1..=5;
    /// a scored evaluation is terminal.
    pub async fn score(
        &self,
        evaluation_id: &str,
        accuracy: i64,
        tone: i64,
        actionability: i64,
        risk_awareness: i64,
        comments: Option<String>,
    ) -> Result<ScoreOutcome> {
        for (name, value) in [
            ("accuracy", accuracy),
            ("tone", tone),
            ("actionability", actionability),
            ("riskAwareness", risk_awareness),
        ] {
            if !(1..=5).contains(&value) {
                return Err(HandoverError::validation(format!(
                    "Invalid {name}. Must be an integer between 1 and 5."
                )));
            }
        }

        let mut evaluation: Evaluation = self
            .store
            .get(&format!("evaluations/{evaluation_id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Evaluation", evaluation_id))?;

        if evaluation.status == EvaluationStatus::Scored {
            return Err(HandoverError::conflict(
                "Evaluation has already been scored.",
            ));
        }

        let scores = Scores {
            accuracy: accuracy as u8,
            tone: tone as u8,
            actionability: actionability as u8,
            risk_awareness: risk_awareness as u8,
            average: (accuracy + tone + actionability + risk_awareness) as f64 / 4.0,
        };
        let now = Utc::now();
        evaluation.scores = Some(scores.clone());
        evaluation.comments = comments;
        evaluation.status = EvaluationStatus::Scored;
        evaluation.evaluated_at = Some(now);
        self.store
            .put(&format!("evaluations/{evaluation_id}"), &evaluation)
            .await
            .store_err()?;

        Ok(ScoreOutcome {
            evaluation_id: evaluation_id.to_owned(),
            scores,
            status: EvaluationStatus::Scored,
            evaluated_at: now,
        })
    }

    async fn scored_evaluations(&self) -> Result<Vec<Evaluation>> {
        let mut evaluations: Vec<Evaluation> =
            self.store.get_all("evaluations").await.store_err()?;
        evaluations.retain(|e| e.status == EvaluationStatus::Scored);
        Ok(evaluations)
    }

    pub async fn persona_analytics(&self, persona_id: &str) -> Result<PersonaAnalytics> {
        let persona: Persona = self
            .store
            .get(&format!("personas/{persona_id}"))
            .await
            .store_err()?
            .ok_or_else(|| HandoverError::not_found("Persona", persona_id))?;

        let evaluations: Vec<Evaluation> = self
            .scored_evaluations()
            .await?
            .into_iter()
            .filter(|e| e.persona_id == persona_id)
            .collect();
        let average_scores = average_scores(&evaluations);

        let mut by_scenario: BTreeMap<String, Vec<&Evaluation>> = BTreeMap::new();
        for evaluation in &evaluations {
            by_scenario
                .entry(evaluation.scenario_id.clone())
                .or_default()
                .push(evaluation);
        }
        let scenario_evaluations = by_scenario
            .into_iter()
            .map(|(scenario_id, evals)| {
                let averages = average_scores_ref(&evals);
                ScenarioBreakdown {
                    scenario_id,
                    scenario_title: evals[0].scenario_title.clone(),
                    evaluation_count: evals.len(),
                    average_scores: averages,
                    needs_attention: averages.overall < LOW_SCORE_THRESHOLD,
                }
            })
            .collect();

        Ok(PersonaAnalytics {
            persona_id: persona_id.to_owned(),
            persona_role: persona.role,
            version: persona.version,
            total_evaluations: evaluations.len(),
            needs_calibration: average_scores.overall < LOW_SCORE_THRESHOLD,
            calibration_threshold: LOW_SCORE_THRESHOLD,
            average_scores,
            scenario_evaluations,
        })
    }

    pub async fn scenario_analytics(&self) -> Result<ScenarioAnalytics> {
        let evaluations = self.scored_evaluations().await?;

        let mut by_scenario: BTreeMap<String, Vec<&Evaluation>> = BTreeMap::new();
        for evaluation in &evaluations {
            by_scenario
                .entry(evaluation.scenario_id.clone())
                .or_default()
                .push(evaluation);
        }

        let mut scenarios: Vec<ScenarioAnalyticsRow> = by_scenario
            .into_iter()
            .map(|(scenario_id, evals)| {
                let averages = average_scores_ref(&evals);
                let personas: std::collections::BTreeSet<&str> =
                    evals.iter().map(|e| e.persona_id.as_str()).collect();
                ScenarioAnalyticsRow {
                    scenario_id,
                    scenario_title: evals[0].scenario_title.clone(),
                    evaluation_count: evals.len(),
                    personas_evaluated: personas.len(),
                    is_problematic: averages.overall < LOW_SCORE_THRESHOLD
                        && personas.len() >= 2,
                    average_scores: averages,
                }
            })
            .collect();

        // Problematic first, then worst overall score first.
        scenarios.sort_by(|a, b| {
            b.is_problematic.cmp(&a.is_problematic).then(
                a.average_scores
                    .overall
                    .partial_cmp(&b.average_scores.overall)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
        });

        let problematic = scenarios.iter().filter(|s| s.is_problematic).count();
        Ok(ScenarioAnalytics {
            total_scenarios: scenarios.len(),
            total_evaluations: evaluations.len(),
            problematic_scenarios: problematic,
            threshold: LOW_SCORE_THRESHOLD,
            scenarios,
        })
    }

    pub async fn summary(&self) -> Result<QaSummary> {
        let evaluations = self.scored_evaluations().await?;

        let mut by_persona: BTreeMap<String, Vec<&Evaluation>> = BTreeMap::new();
        for evaluation in &evaluations {
            by_persona
                .entry(evaluation.persona_id.clone())
                .or_default()
                .push(evaluation);
        }
        let persona_stats: Vec<PersonaStat> = by_persona
            .iter()
            .map(|(persona_id, evals)| {
                let averages = average_scores_ref(evals);
                PersonaStat {
                    persona_id: persona_id.clone(),
                    persona_role: evals[0].persona_role.clone(),
                    version: evals[0].persona_version,
                    evaluation_count: evals.len(),
                    needs_calibration: averages.overall < LOW_SCORE_THRESHOLD,
                    average_scores: averages,
                }
            })
            .collect();
        let flagged_personas: Vec<PersonaStat> = persona_stats
            .iter()
            .filter(|p| p.needs_calibration)
            .cloned()
            .collect();

        let scenario_analytics = self.scenario_analytics().await?;
        let problematic_scenarios: Vec<ScenarioAnalyticsRow> = scenario_analytics
            .scenarios
            .into_iter()
            .filter(|s| s.is_problematic)
            .collect();

        let overall_averages = average_scores(&evaluations);
        Ok(QaSummary {
            total_evaluations: evaluations.len(),
            total_personas_evaluated: by_persona.len(),
            total_scenarios_used: scenario_analytics.total_scenarios,
            overall_average_score: overall_averages.overall,
            threshold: LOW_SCORE_THRESHOLD,
            overall_averages,
            flagged_personas,
            problematic_scenarios,
            persona_stats,
        })
    }

    /// All scored evaluations as CSV, quotes escaped by doubling.
    pub async fn export_csv(&self) -> Result<String> {
        let evaluations = self.scored_evaluations().await?;

        let mut lines = vec![concat!(
            "Evaluation ID,Persona ID,Persona Role,Persona Version,Scenario ID,",
            "Scenario Title,Accuracy,Tone,Actionability,Risk Awareness,Average,",
            "Comments,Evaluated At"
        )
        .to_owned()];

        for e in &evaluations {
            let scores = e.scores.as_ref();
            let cells = [
                e.id.clone(),
                e.persona_id.clone(),
                e.persona_role.clone().unwrap_or_default(),
                e.persona_version.to_string(),
                e.scenario_id.clone(),
                e.scenario_title.clone(),
                scores.map(|s| s.accuracy.to_string()).unwrap_or_default(),
                scores.map(|s| s.tone.to_string()).unwrap_or_default(),
                scores
                    .map(|s| s.actionability.to_string())
                    .unwrap_or_default(),
                scores
                    .map(|s| s.risk_awareness.to_string())
                    .unwrap_or_default(),
                scores.map(|s| s.average.to_string()).unwrap_or_default(),
                e.comments.clone().unwrap_or_default().replace('"', "\"\""),
                e.evaluated_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ];
            lines.push(
                cells
                    .iter()
                    .map(|cell| format!("\"{cell}\""))
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }

        Ok(lines.join("\n"))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average_scores_ref(evaluations: &[&Evaluation]) -> AverageScores {
    if evaluations.is_empty() {
        return AverageScores::default();
    }
    let mut totals = (0u32, 0u32, 0u32, 0u32);
    for evaluation in evaluations {
        if let Some(scores) = &evaluation.scores {
            totals.0 += scores.accuracy as u32;
            totals.1 += scores.tone as u32;
            totals.2 += scores.actionability as u32;
            totals.3 += scores.risk_awareness as u32;
        }
    }
    let count = evaluations.len() as f64;
    let accuracy = round2(totals.0 as f64 / count);
    let tone = round2(totals.1 as f64 / count);
    let actionability = round2(totals.2 as f64 / count);
    let risk_awareness = round2(totals.3 as f64 / count);
    AverageScores {
        accuracy,
        tone,
        actionability,
        risk_awareness,
        overall: round2((accuracy + tone + actionability + risk_awareness) / 4.0),
    }
}

fn average_scores(evaluations: &[Evaluation]) -> AverageScores {
    let refs: Vec<&Evaluation> = evaluations.iter().collect();
    average_scores_ref(&refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use handover_provider::{ChatRequest, ChatResponse};
    use handover_schema::PersonaStatus;
    use handover_store::FsDocumentStore;
    use tempfile::TempDir;

    struct FixedClient;

    #[async_trait]
    impl LlmClient for FixedClient {
        async fn chat(&self, _request: ChatRequest) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse {
                text: "I would escalate to the S151 officer.".into(),
                input_tokens: None,
                output_tokens: None,
            })
        }
    }

    fn persona(id: &str, role: &str) -> Persona {
        Persona {
            id: id.into(),
            role: Some(role.into()),
            version: 1,
            interview_id: "i1".into(),
            prompt_text: "I am an expert.".into(),
            status: PersonaStatus::Draft,
            validated_by: None,
            validated_at: None,
            is_favorite: false,
            feedback_history: vec![],
            name: None,
            bio: None,
            organization: None,
            industry: None,
            viewed_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn scenario(id: &str, role: &str) -> Scenario {
        Scenario {
            id: id.into(),
            role: role.into(),
            title: format!("Scenario {id}"),
            context: "A supplier invoice looks suspicious.".into(),
            question: "What do you do first?".into(),
        }
    }

    async fn setup() -> (QaService, Arc<FsDocumentStore>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsDocumentStore::new(tmp.path()));
        store
            .put("personas/p1", &persona("p1", "Finance Director"))
            .await
            .unwrap();
        store
            .put(
                "scenarios/finance-director/s1",
                &scenario("s1", "Finance Director"),
            )
            .await
            .unwrap();
        let service = QaService::new(
            store.clone(),
            Arc::new(FixedClient),
            Arc::new(RoleCatalog::builtin()),
            "test-model".into(),
        );
        (service, store, tmp)
    }

    #[tokio::test]
    async fn run_stores_pending_evaluation() {
        let (service, store, _tmp) = setup().await;
        let outcome = service.run("p1", "s1").await.unwrap();
        assert!(!outcome.response.is_empty());

        let evaluation: Evaluation = store
            .get(&format!("evaluations/{}", outcome.evaluation_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evaluation.status, EvaluationStatus::Pending);
        assert!(evaluation.question.starts_with("Context: "));
        assert!(evaluation.question.contains("Question: "));
    }

    #[tokio::test]
    async fn run_unknown_persona_or_scenario_is_not_found() {
        let (service, _store, _tmp) = setup().await;
        assert!(matches!(
            service.run("ghost", "s1").await.unwrap_err(),
            HandoverError::NotFound(_)
        ));
        assert!(matches!(
            service.run("p1", "ghost").await.unwrap_err(),
            HandoverError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn score_validates_range_and_computes_exact_mean() {
        let (service, store, _tmp) = setup().await;
        let outcome = service.run("p1", "s1").await.unwrap();

        let err = service
            .score(&outcome.evaluation_id, 6, 3, 3, 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Validation(_)));
        // Rejected scores leave the evaluation untouched.
        let evaluation: Evaluation = store
            .get(&format!("evaluations/{}", outcome.evaluation_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evaluation.status, EvaluationStatus::Pending);

        let err = service
            .score(&outcome.evaluation_id, 0, 3, 3, 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Validation(_)));

        let scored = service
            .score(&outcome.evaluation_id, 4, 3, 5, 2, Some("decent".into()))
            .await
            .unwrap();
        assert_eq!(scored.scores.average, (4 + 3 + 5 + 2) as f64 / 4.0);
        assert_eq!(scored.status, EvaluationStatus::Scored);
    }

    #[tokio::test]
    async fn scoring_twice_is_a_conflict() {
        let (service, _store, _tmp) = setup().await;
        let outcome = service.run("p1", "s1").await.unwrap();
        service
            .score(&outcome.evaluation_id, 4, 4, 4, 4, None)
            .await
            .unwrap();
        let err = service
            .score(&outcome.evaluation_id, 5, 5, 5, 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::Conflict(_)));
    }

    #[tokio::test]
    async fn scenarios_for_role_rejects_unknown_role() {
        let (service, _store, _tmp) = setup().await;
        assert_eq!(
            service
                .scenarios_for_role("Finance Director")
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(matches!(
            service.scenarios_for_role("Head of Fun").await.unwrap_err(),
            HandoverError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn persona_analytics_flags_low_scores() {
        let (service, _store, _tmp) = setup().await;
        let a = service.run("p1", "s1").await.unwrap();
        service.score(&a.evaluation_id, 2, 2, 2, 2, None).await.unwrap();

        let analytics = service.persona_analytics("p1").await.unwrap();
        assert_eq!(analytics.total_evaluations, 1);
        assert_eq!(analytics.average_scores.overall, 2.0);
        assert!(analytics.needs_calibration);
        assert_eq!(analytics.scenario_evaluations.len(), 1);
        assert!(analytics.scenario_evaluations[0].needs_attention);
    }

    #[tokio::test]
    async fn scenario_is_problematic_only_across_two_personas() {
        let (service, store, _tmp) = setup().await;
        store
            .put("personas/p2", &persona("p2", "Finance Director"))
            .await
            .unwrap();

        let a = service.run("p1", "s1").await.unwrap();
        service.score(&a.evaluation_id, 2, 2, 2, 2, None).await.unwrap();

        // One persona below threshold: not problematic yet.
        let analytics = service.scenario_analytics().await.unwrap();
        assert!(!analytics.scenarios[0].is_problematic);

        let b = service.run("p2", "s1").await.unwrap();
        service.score(&b.evaluation_id, 3, 3, 3, 3, None).await.unwrap();

        let analytics = service.scenario_analytics().await.unwrap();
        assert_eq!(analytics.scenarios[0].personas_evaluated, 2);
        assert!(analytics.scenarios[0].is_problematic);
        assert_eq!(analytics.problematic_scenarios, 1);
    }

    #[tokio::test]
    async fn summary_counts_and_flags() {
        let (service, _store, _tmp) = setup().await;
        let a = service.run("p1", "s1").await.unwrap();
        service.score(&a.evaluation_id, 5, 5, 4, 5, None).await.unwrap();

        let summary = service.summary().await.unwrap();
        assert_eq!(summary.total_evaluations, 1);
        assert_eq!(summary.total_personas_evaluated, 1);
        assert_eq!(summary.total_scenarios_used, 1);
        assert!(summary.flagged_personas.is_empty());
        assert_eq!(summary.overall_averages.overall, 4.75);
    }

    #[tokio::test]
    async fn csv_export_escapes_quotes() {
        let (service, _store, _tmp) = setup().await;
        let a = service.run("p1", "s1").await.unwrap();
        service
            .score(
                &a.evaluation_id,
                4,
                4,
                4,
                4,
                Some("said \"fine\" twice".into()),
            )
            .await
            .unwrap();

        let csv = service.export_csv().await.unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("Evaluation ID,"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"said \"\"fine\"\" twice\""));
        assert!(row.contains("\"4\""));
    }
}
