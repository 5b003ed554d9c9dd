// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Self-reflection grading of draft answers.
//!
//! A draft is scored on three axes:
//! - model-rated quality (relevance, completeness, clarity, structure, reasoning)
//! - factual accuracy: every claim is cross-checked against the evidence
//! - hallucination: the larger of the model's own check and the share of
//!   unverified claims
//!
//! The grader only scores. The pass / warn / correct policy is applied by
//! the session, which owns the engines.

use std::collections::VecDeque;
use std::sync::LazyLock;

use kestrel_config::model::ReflectionConfig;
use kestrel_core::KestrelError;
use kestrel_core::json::parse_object;
use kestrel_core::text::truncate_chars;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::engines::{ModelHandle, PROMPT_EVIDENCE_CHARS};
use crate::evidence::EvidenceBundle;

/// Score given to every quality axis when the model's rating is unusable.
const NEUTRAL_QUALITY: f64 = 0.7;

const MAX_CLAIMS: usize = 10;

/// Share of a non-numeric claim's words that must occur in the evidence.
const WORD_OVERLAP: f64 = 0.3;

/// Model hallucination confidence above which a removal hint is added.
const HALLUCINATION_HINT: f64 = 0.3;

const MAX_SUGGESTIONS: usize = 3;

const RECENT_SCORES: usize = 5;

const DEFAULT_SUGGESTIONS: [&str; 3] = [
    "Cite the exact figures from the evidence",
    "State plainly which data is unavailable",
    "Finish with a concrete recommendation",
];

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number pattern is valid"));

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•#>]+|\d+[.)])\s*").expect("list marker pattern is valid")
});

fn neutral() -> f64 {
    NEUTRAL_QUALITY
}

/// Model-rated quality, each axis in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    #[serde(default = "neutral")]
    pub relevance: f64,
    #[serde(default = "neutral")]
    pub completeness: f64,
    #[serde(default = "neutral")]
    pub clarity: f64,
    #[serde(default = "neutral")]
    pub structure: f64,
    #[serde(default = "neutral")]
    pub reasoning: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl Default for QualityScores {
    fn default() -> Self {
        Self {
            relevance: NEUTRAL_QUALITY,
            completeness: NEUTRAL_QUALITY,
            clarity: NEUTRAL_QUALITY,
            structure: NEUTRAL_QUALITY,
            reasoning: NEUTRAL_QUALITY,
            suggestions: Vec::new(),
        }
    }
}

impl QualityScores {
    fn clamped(mut self) -> Self {
        for axis in [
            &mut self.relevance,
            &mut self.completeness,
            &mut self.clarity,
            &mut self.structure,
            &mut self.reasoning,
        ] {
            *axis = axis.clamp(0.0, 1.0);
        }
        self
    }

    pub fn mean(&self) -> f64 {
        (self.relevance + self.completeness + self.clarity + self.structure + self.reasoning) / 5.0
    }
}

#[derive(Debug, Default, Deserialize)]
struct HallucinationCheck {
    #[serde(default)]
    has_hallucination: bool,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    suspicious_parts: Vec<String>,
}

/// Scores for one draft answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectionReport {
    pub quality: QualityScores,
    pub quality_score: f64,
    pub accuracy: f64,
    pub hallucination: f64,
    pub overall: f64,
    /// True when `overall` reached the pass threshold.
    pub passed: bool,
    pub claims_checked: usize,
    /// Claims that could not be traced to the evidence, plus any the
    /// model flagged as suspicious.
    pub hallucination_candidates: Vec<String>,
    pub improvements: Vec<String>,
    /// Score of the rejected draft, set on the report of a correction.
    pub original_score: Option<f64>,
    /// `overall - original_score` for a correction.
    pub improvement: Option<f64>,
}

impl ReflectionReport {
    /// Marks this report as the regrade of a corrected draft.
    pub fn as_correction_of(mut self, original: &ReflectionReport) -> Self {
        self.original_score = Some(original.overall);
        self.improvement = Some(self.overall - original.overall);
        self
    }
}

/// Where an overall score falls relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeBand {
    Pass,
    /// Between the warn and pass thresholds: returned with a warning.
    Warn,
    /// Below the warn threshold: one correction is attempted.
    Fail,
}

/// One claim and whether the evidence backs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimCheck {
    pub claim: String,
    pub verified: bool,
}

/// Grades drafts with the completion backend.
pub struct SelfReflection {
    model: ModelHandle,
    pass_threshold: f64,
    warn_threshold: f64,
    quality_weight: f64,
    accuracy_weight: f64,
    hallucination_weight: f64,
}

impl SelfReflection {
    pub fn new(model: ModelHandle, config: &ReflectionConfig) -> Self {
        Self {
            model,
            pass_threshold: config.pass_threshold,
            warn_threshold: config.warn_threshold,
            quality_weight: config.quality_weight,
            accuracy_weight: config.accuracy_weight,
            hallucination_weight: config.hallucination_weight,
        }
    }

    pub fn band(&self, overall: f64) -> GradeBand {
        if overall >= self.pass_threshold {
            GradeBand::Pass
        } else if overall >= self.warn_threshold {
            GradeBand::Warn
        } else {
            GradeBand::Fail
        }
    }

    /// Grades `answer` against `evidence`.
    ///
    /// Fails only when the quality rating call cannot reach the backend;
    /// the caller then returns the draft unverified.
    pub async fn grade(
        &self,
        query: &str,
        answer: &str,
        evidence: &EvidenceBundle,
    ) -> Result<ReflectionReport, KestrelError> {
        let evidence_text = evidence.render_for_prompt(PROMPT_EVIDENCE_CHARS);

        let quality_raw = self
            .model
            .complete(&quality_prompt(query, answer, &evidence_text))
            .await?;
        let (quality, quality_parsed) = match parse_object::<QualityScores>(&quality_raw) {
            Ok(scores) => (scores.clamped(), true),
            Err(e) => {
                warn!(error = %e, "unparsable quality rating, using neutral scores");
                (QualityScores::default(), false)
            }
        };

        let check = match self
            .model
            .complete(&hallucination_prompt(answer, &evidence_text))
            .await
        {
            Ok(raw) => parse_object::<HallucinationCheck>(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "unparsable hallucination check");
                HallucinationCheck::default()
            }),
            Err(e) => {
                warn!(error = %e, "hallucination check unavailable");
                HallucinationCheck::default()
            }
        };
        let model_hallucination = if check.has_hallucination {
            check.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let checks = check_claims(answer, evidence);
        let verified = checks.iter().filter(|c| c.verified).count();
        let accuracy = if checks.is_empty() {
            1.0
        } else {
            verified as f64 / checks.len() as f64
        };
        let hallucination = model_hallucination.max(1.0 - accuracy);
        let quality_score = quality.mean();
        let overall = self.combine(quality_score, accuracy, hallucination);
        let passed = overall >= self.pass_threshold;

        let mut candidates: Vec<String> = checks
            .iter()
            .filter(|c| !c.verified)
            .map(|c| c.claim.clone())
            .collect();
        for part in check.suspicious_parts {
            if !part.trim().is_empty() && !candidates.contains(&part) {
                candidates.push(part);
            }
        }

        let improvements = if passed {
            Vec::new()
        } else {
            improvements(&quality, quality_parsed, accuracy, model_hallucination, &candidates)
        };

        debug!(
            quality = quality_score,
            accuracy,
            hallucination,
            overall,
            claims = checks.len(),
            "draft graded"
        );

        Ok(ReflectionReport {
            quality,
            quality_score,
            accuracy,
            hallucination,
            overall,
            passed,
            claims_checked: checks.len(),
            hallucination_candidates: candidates,
            improvements,
            original_score: None,
            improvement: None,
        })
    }

    fn combine(&self, quality: f64, accuracy: f64, hallucination: f64) -> f64 {
        let (wq, wa, wh) = (
            self.quality_weight.max(0.0),
            self.accuracy_weight.max(0.0),
            self.hallucination_weight.max(0.0),
        );
        let sum = wq + wa + wh;
        if sum <= f64::EPSILON {
            return (quality + accuracy + (1.0 - hallucination)) / 3.0;
        }
        ((wq * quality + wa * accuracy + wh * (1.0 - hallucination)) / sum).clamp(0.0, 1.0)
    }
}

fn quality_prompt(query: &str, answer: &str, evidence: &str) -> String {
    format!(
        "Rate the answer to the question on a scale from 0 to 1 for each criterion.\n\n\
         Question: {query}\n\n\
         Evidence (JSON):\n{evidence}\n\n\
         Answer:\n{answer}\n\n\
         Respond with JSON only:\n\
         {{\"relevance\": 0.0, \"completeness\": 0.0, \"clarity\": 0.0, \"structure\": 0.0, \
         \"reasoning\": 0.0, \"suggestions\": [\"...\"]}}\n"
    )
}

fn hallucination_prompt(answer: &str, evidence: &str) -> String {
    format!(
        "Check the answer for unsupported claims: statements, numbers or names that do not \
         follow from the evidence.\n\n\
         Evidence (JSON):\n{evidence}\n\n\
         Answer:\n{answer}\n\n\
         Respond with JSON only:\n\
         {{\"has_hallucination\": false, \"confidence\": 0.0, \"suspicious_parts\": []}}\n"
    )
}

fn improvements(
    quality: &QualityScores,
    quality_parsed: bool,
    accuracy: f64,
    model_hallucination: f64,
    candidates: &[String],
) -> Vec<String> {
    let mut list = Vec::new();
    if accuracy < 1.0 {
        let unsupported: Vec<&str> = candidates
            .iter()
            .take(3)
            .map(|c| truncate_chars(c, 80))
            .collect();
        list.push(format!(
            "Use only figures present in the evidence. Unsupported: {}",
            unsupported.join("; ")
        ));
    }
    if model_hallucination > HALLUCINATION_HINT {
        list.push("Remove statements the evidence does not support".to_string());
    }
    if quality.relevance < NEUTRAL_QUALITY {
        list.push("Answer the question that was asked".to_string());
    }
    if quality.completeness < NEUTRAL_QUALITY {
        list.push("Cover every part of the question".to_string());
    }
    if quality.clarity < NEUTRAL_QUALITY {
        list.push("Use shorter, more direct sentences".to_string());
    }
    if quality.structure < NEUTRAL_QUALITY {
        list.push("Organize the answer into short sections or bullet points".to_string());
    }

    if quality_parsed && !quality.suggestions.is_empty() {
        list.extend(
            quality
                .suggestions
                .iter()
                .filter(|s| !s.trim().is_empty())
                .take(MAX_SUGGESTIONS)
                .cloned(),
        );
    } else {
        list.extend(DEFAULT_SUGGESTIONS.iter().map(|s| s.to_string()));
    }
    list
}

/// Splits an answer into checkable claims.
///
/// A claim is a sentence that contains a digit or has more than five
/// words. List markers are stripped. At most ten claims are returned.
pub fn extract_claims(answer: &str) -> Vec<String> {
    let mut claims = Vec::new();
    for line in answer.lines() {
        for sentence in split_sentences(line) {
            let sentence = LIST_MARKER.replace(sentence, "");
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let has_digit = sentence.chars().any(|c| c.is_ascii_digit());
            if has_digit || sentence.split_whitespace().count() > 5 {
                claims.push(sentence.to_string());
                if claims.len() == MAX_CLAIMS {
                    return claims;
                }
            }
        }
    }
    claims
}

/// Splits at `.`, `!` or `?` followed by whitespace or the end of the line,
/// so decimals stay intact.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if boundary {
                let end = i + c.len_utf8();
                sentences.push(&line[start..end]);
                start = end;
            }
        }
    }
    if start < line.len() {
        sentences.push(&line[start..]);
    }
    sentences
}

/// Checks every claim of `answer` against `evidence`.
pub fn check_claims(answer: &str, evidence: &EvidenceBundle) -> Vec<ClaimCheck> {
    let numbers = EvidenceNumbers::collect(evidence);
    let evidence_lower = evidence.to_json_string().to_lowercase();

    extract_claims(answer)
        .into_iter()
        .map(|claim| {
            let verified = verify_claim(&claim, &numbers, &evidence_lower);
            ClaimCheck { claim, verified }
        })
        .collect()
}

/// The statistic a number in a claim is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Total,
    Pass,
    Fail,
    PassRate,
}

impl Quantity {
    /// Evidence keys holding values of this quantity.
    fn keys(self) -> &'static [&'static str] {
        match self {
            Quantity::Total => &["total"],
            Quantity::Pass => &["pass"],
            Quantity::Fail => &["fail", "fail_count"],
            Quantity::PassRate => &["pass_rate"],
        }
    }

    /// Unit word written after a number: "7 inspections", "2 failed".
    fn from_unit(word: &str) -> Option<Self> {
        match word {
            "inspection" | "inspections" | "record" | "records" => Some(Quantity::Total),
            "pass" | "passes" | "passed" | "passing" => Some(Quantity::Pass),
            "fail" | "fails" | "failed" | "failing" | "failure" | "failures" => {
                Some(Quantity::Fail)
            }
            _ => None,
        }
    }

    /// Label written before a number and a colon: "Total: 7".
    fn from_label(word: &str) -> Option<Self> {
        match word {
            "total" => Some(Quantity::Total),
            "rate" => Some(Quantity::PassRate),
            other => Self::from_unit(other),
        }
    }

    /// Binds the number spanning `claim[start..end]` to a quantity.
    fn of_number(claim: &str, start: usize, end: usize) -> Option<Self> {
        let after = claim[end..].trim_start();
        if after.starts_with('%') {
            return Some(Quantity::PassRate);
        }
        let unit: String = after
            .chars()
            .take_while(|c| c.is_alphabetic())
            .collect::<String>()
            .to_lowercase();
        Self::from_unit(&unit).or_else(|| {
            let label = claim[..start].trim_end().strip_suffix(':')?;
            let word = label
                .split_whitespace()
                .last()?
                .trim_matches(|c: char| !c.is_alphabetic())
                .to_lowercase();
            Self::from_label(&word)
        })
    }
}

/// Numeric values of the evidence, both keyed by field name and as a flat
/// bag that also includes numbers inside strings.
struct EvidenceNumbers {
    keyed: Vec<(String, f64)>,
    all: Vec<f64>,
}

impl EvidenceNumbers {
    fn collect(evidence: &EvidenceBundle) -> Self {
        let mut keyed = Vec::new();
        for section in evidence.sections() {
            if let Some(value) = evidence.get(section) {
                collect_keyed(value, "", &mut keyed);
            }
        }
        let all = NUMBER
            .find_iter(&evidence.to_json_string())
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        Self { keyed, all }
    }

    /// A number bound to a quantity must match that quantity when the
    /// evidence has it; otherwise any evidence number will do.
    fn supports(&self, number: &str, quantity: Option<Quantity>) -> bool {
        if let Some(quantity) = quantity {
            let values: Vec<f64> = self
                .keyed
                .iter()
                .filter(|(key, _)| quantity.keys().contains(&key.as_str()))
                .map(|(_, value)| *value)
                .collect();
            if !values.is_empty() {
                return number_matches(number, &values, quantity == Quantity::PassRate);
            }
        }
        number_matches(number, &self.all, false)
    }
}

fn collect_keyed(value: &Value, key: &str, out: &mut Vec<(String, f64)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                collect_keyed(v, k, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_keyed(item, key, out);
            }
        }
        Value::Number(n) => {
            if let Some(n) = n.as_f64() {
                out.push((key.to_string(), n));
            }
        }
        _ => {}
    }
}

fn verify_claim(claim: &str, numbers: &EvidenceNumbers, evidence_lower: &str) -> bool {
    let found: Vec<_> = NUMBER.find_iter(claim).collect();
    if !found.is_empty() {
        return found.iter().all(|m| {
            let quantity = Quantity::of_number(claim, m.start(), m.end());
            numbers.supports(m.as_str(), quantity)
        });
    }

    let words: Vec<String> = claim
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 3)
        .collect();
    if words.is_empty() {
        return true;
    }
    let found = words.iter().filter(|w| evidence_lower.contains(w.as_str())).count();
    found as f64 / words.len() as f64 > WORD_OVERLAP
}

/// Integers compare exactly and decimals at one decimal place. A rate
/// written as a whole percent also matches its rounded value.
fn number_matches(number: &str, candidates: &[f64], rate: bool) -> bool {
    let Ok(value) = number.parse::<f64>() else {
        return false;
    };
    if number.contains('.') {
        let target = round1(value);
        candidates.iter().any(|c| round1(*c) == target)
    } else if rate {
        candidates.iter().any(|c| c.round() == value)
    } else {
        candidates.iter().any(|c| *c == value)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Aggregate view of past grades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReflectionSummary {
    pub count: usize,
    pub average_score: f64,
    pub pass_rate: f64,
    pub recent_scores: Vec<f64>,
}

/// Running record of every final grade in a session.
#[derive(Debug, Default)]
pub struct ReflectionHistory {
    count: usize,
    total_score: f64,
    passed: usize,
    recent: VecDeque<f64>,
}

impl ReflectionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: &ReflectionReport) {
        self.count += 1;
        self.total_score += report.overall;
        if report.passed {
            self.passed += 1;
        }
        if self.recent.len() == RECENT_SCORES {
            self.recent.pop_front();
        }
        self.recent.push_back(report.overall);
    }

    pub fn summary(&self) -> ReflectionSummary {
        if self.count == 0 {
            return ReflectionSummary::default();
        }
        ReflectionSummary {
            count: self.count,
            average_score: self.total_score / self.count as f64,
            pass_rate: self.passed as f64 / self.count as f64,
            recent_scores: self.recent.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{PeriodStatistics, Section};
    use kestrel_core::{Period, Statistics};
    use kestrel_test_utils::MockCompletion;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    const GOOD_QUALITY: &str = r#"{"relevance": 0.9, "completeness": 0.9, "clarity": 0.9, "structure": 0.9, "reasoning": 0.9, "suggestions": ["Mention the station"]}"#;
    const NO_HALLUCINATION: &str =
        r#"{"has_hallucination": false, "confidence": 0.1, "suspicious_parts": []}"#;

    fn evidence(total: u64, pass: u64, fail: u64) -> EvidenceBundle {
        let mut bundle = EvidenceBundle::new();
        bundle.insert(
            Section::Statistics,
            serde_json::to_value(PeriodStatistics {
                period: Period::Today,
                stats: Statistics::from_counts(total, pass, fail),
            })
            .unwrap(),
        );
        bundle
    }

    fn grader(mock: Arc<MockCompletion>) -> SelfReflection {
        SelfReflection::new(
            ModelHandle::new(mock, Duration::from_secs(5)),
            &ReflectionConfig::default(),
        )
    }

    fn healthy_mock() -> Arc<MockCompletion> {
        Arc::new(
            MockCompletion::new()
                .with_rule("Rate the answer", GOOD_QUALITY)
                .with_rule("Check the answer", NO_HALLUCINATION),
        )
    }

    #[test]
    fn claims_skip_short_sentences_and_strip_markers() {
        let claims = extract_claims(
            "Inspection count:\n- Total: 7\n2. Pass rate: 71.4%. Looks fine.\n\
             The camera on the second line keeps failing badly!",
        );
        assert_eq!(
            claims,
            vec![
                "Total: 7",
                "Pass rate: 71.4%.",
                "The camera on the second line keeps failing badly!",
            ]
        );
    }

    #[test]
    fn claims_are_capped() {
        let answer = (1..=15).map(|i| format!("Item {i}.")).collect::<Vec<_>>().join(" ");
        assert_eq!(extract_claims(&answer).len(), MAX_CLAIMS);
    }

    #[test]
    fn rates_compare_at_one_decimal_and_integers_exactly() {
        let evidence = evidence(7, 5, 2);
        let checks = check_claims("Pass rate was 71.4% today.\nThere were 71 passes.", &evidence);
        assert!(checks[0].verified);
        assert!(!checks[1].verified);
    }

    #[test]
    fn numbers_are_checked_against_the_statistic_they_name() {
        let evidence = evidence(7, 5, 2);
        let checks = check_claims(
            "There were 5 inspections today.\n\
             Only 7 passed.\n\
             Total: 5\n\
             Today there were 7 inspections and 2 failed.\n\
             FAIL: 2\n\
             The pass rate was about 71%.",
            &evidence,
        );
        let verified: Vec<bool> = checks.iter().map(|c| c.verified).collect();
        assert_eq!(verified, vec![false, false, false, true, true, true]);
    }

    #[test]
    fn unbound_numbers_fall_back_to_any_evidence_value() {
        let evidence = evidence(7, 5, 2);
        let checks = check_claims("Station 5 reported twice.\nStation 9 reported twice.", &evidence);
        assert!(checks[0].verified);
        assert!(!checks[1].verified);
    }

    #[test]
    fn word_overlap_verifies_non_numeric_claims() {
        let mut bundle = EvidenceBundle::new();
        bundle.insert(
            Section::Documents,
            serde_json::json!([{"source": "manual.md", "excerpt": "Clean the camera lens before every shift"}]),
        );
        let checks = check_claims(
            "You should clean the camera lens before the shift starts.\n\
             Operators must recalibrate conveyor motors weekly without exception.",
            &bundle,
        );
        assert!(checks[0].verified);
        assert!(!checks[1].verified);
    }

    #[tokio::test]
    async fn wrong_total_is_flagged() {
        let mock = healthy_mock();
        let report = grader(mock)
            .grade(
                "how many inspections today",
                "There were 5 inspections today.",
                &evidence(7, 5, 2),
            )
            .await
            .unwrap();

        assert_eq!(report.claims_checked, 1);
        assert!(report.accuracy < 1.0);
        assert_eq!(report.hallucination_candidates, vec!["There were 5 inspections today."]);
        assert!(report.overall < 0.8);
        assert!(!report.passed);
        assert!(report.improvements[0].contains("Unsupported"));
        assert!(report.improvements.contains(&"Mention the station".to_string()));
    }

    #[tokio::test]
    async fn grounded_answer_passes() {
        let mock = healthy_mock();
        let grader = grader(mock.clone());
        let report = grader
            .grade(
                "how many inspections today",
                "Today there were 7 inspections: 5 passed and 2 failed, a pass rate of 71.4%.",
                &evidence(7, 5, 2),
            )
            .await
            .unwrap();

        assert_eq!(report.accuracy, 1.0);
        assert!(report.passed);
        assert_eq!(grader.band(report.overall), GradeBand::Pass);
        assert!(report.improvements.is_empty());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    #[traced_test]
    async fn unparsable_rating_uses_neutral_scores() {
        let mock = Arc::new(
            MockCompletion::new()
                .with_rule("Rate the answer", "Pretty good overall!")
                .with_rule("Check the answer", "not json"),
        );
        let report = grader(mock)
            .grade("q", "There were 9 inspections.", &evidence(7, 5, 2))
            .await
            .unwrap();

        assert_eq!(report.quality, QualityScores::default());
        assert!(logs_contain("unparsable quality rating"));
        for default in DEFAULT_SUGGESTIONS {
            assert!(report.improvements.contains(&default.to_string()));
        }
    }

    #[tokio::test]
    async fn model_flag_raises_hallucination() {
        let mock = Arc::new(
            MockCompletion::new()
                .with_rule("Rate the answer", GOOD_QUALITY)
                .with_rule(
                    "Check the answer",
                    r#"{"has_hallucination": true, "confidence": 0.9, "suspicious_parts": ["the robot arm"]}"#,
                ),
        );
        let report = grader(mock)
            .grade("q", "Total: 7", &evidence(7, 5, 2))
            .await
            .unwrap();
        assert_eq!(report.hallucination, 0.9);
        assert!(report.hallucination_candidates.contains(&"the robot arm".to_string()));
    }

    #[tokio::test]
    async fn unavailable_backend_is_an_error() {
        let err = grader(Arc::new(MockCompletion::unavailable()))
            .grade("q", "Total: 7", &evidence(7, 5, 2))
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn bands_follow_thresholds() {
        let grader = grader(Arc::new(MockCompletion::new()));
        assert_eq!(grader.band(0.8), GradeBand::Pass);
        assert_eq!(grader.band(0.75), GradeBand::Warn);
        assert_eq!(grader.band(0.7), GradeBand::Warn);
        assert_eq!(grader.band(0.69), GradeBand::Fail);
    }

    #[test]
    fn history_keeps_last_five_scores() {
        let mut history = ReflectionHistory::new();
        for (i, passed) in [(1, false), (2, false), (3, false), (4, true), (5, true), (6, true)] {
            let report = ReflectionReport {
                quality: QualityScores::default(),
                quality_score: 0.7,
                accuracy: 1.0,
                hallucination: 0.0,
                overall: i as f64 / 10.0,
                passed,
                claims_checked: 0,
                hallucination_candidates: Vec::new(),
                improvements: Vec::new(),
                original_score: None,
                improvement: None,
            };
            history.record(&report);
        }
        let summary = history.summary();
        assert_eq!(summary.count, 6);
        assert_eq!(summary.pass_rate, 0.5);
        assert_eq!(summary.recent_scores, vec![0.2, 0.3, 0.4, 0.5, 0.6]);
        assert!((summary.average_score - 0.35).abs() < 1e-9);
    }
}
