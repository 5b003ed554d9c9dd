// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic intent classification and entity extraction.
//!
//! Maps query text to an [`Intent`] using bilingual (Thai and English)
//! keyword tables. No model call, no network, no latency. Unmatched input
//! degrades to [`Intent::Summary`].

use std::collections::BTreeSet;
use std::sync::LazyLock;

use kestrel_core::{Entities, Intent, IntentResult, Period, Slot};
use regex::Regex;
use strum::IntoEnumIterator;
use tracing::debug;

const TROUBLESHOOT_KEYWORDS: &[&str] = &[
    "ทำไม", "why", "สาเหตุ", "cause", "causes", "ปัญหา", "problem", "problems",
    "เกิดอะไร", "what happened", "แก้ไข", "fix", "wrong",
];

const ANALYZE_KEYWORDS: &[&str] = &[
    "วิเคราะห์", "analyze", "analyse", "analysis", "แนวโน้ม", "trend", "trends",
    "เปรียบเทียบ", "compare", "comparison", "ประเมิน", "evaluate", "สถานการณ์",
    "situation",
];

const SUMMARY_KEYWORDS: &[&str] = &["สรุป", "summary", "summarize", "overview", "ภาพรวม", "วันนี้"];

const LATEST_KEYWORDS: &[&str] = &["ล่าสุด", "latest", "recent", "เมื่อกี้", "just now", "อันล่าสุด"];

const DETAIL_KEYWORDS: &[&str] = &["รายละเอียด", "detail", "details", "แสดง", "show", "list", "ทั้งหมด", "all"];

const COUNT_KEYWORDS: &[&str] = &["กี่", "how many", "จำนวน", "count"];

/// Words that mark a request to compare two things.
const COMPARISON_CUES: &[&str] = &[
    "compare", "compared", "comparison", "vs", "versus", "than", "difference", "เทียบ",
];

static COUNT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["มี.*ครั้ง", "มี.*รายการ"]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

static STATION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:(sta_\d+)|station\s+([a-z0-9_]+))").ok()
});

const PERIOD_WORDS: &[(&str, Period)] = &[
    ("today", Period::Today),
    ("วันนี้", Period::Today),
    ("yesterday", Period::Yesterday),
    ("เมื่อวาน", Period::Yesterday),
    ("week", Period::Week),
    ("สัปดาห์", Period::Week),
    ("month", Period::Month),
    ("เดือน", Period::Month),
];

/// Returns true when `keyword` occurs in `lower`.
///
/// ASCII keywords must sit on word boundaries; Thai keywords are matched
/// as substrings because Thai text is written without spaces.
pub fn keyword_matches(lower: &str, keyword: &str) -> bool {
    keyword_position(lower, keyword).is_some()
}

/// Byte offset of the first valid occurrence of `keyword` in `lower`.
fn keyword_position(lower: &str, keyword: &str) -> Option<usize> {
    if !keyword.is_ascii() {
        return lower.find(keyword);
    }
    lower
        .match_indices(keyword)
        .find(|(start, matched)| {
            let before = lower[..*start].chars().next_back();
            let after = lower[start + matched.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .map(|(start, _)| start)
}

fn keywords_for(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::Troubleshoot => TROUBLESHOOT_KEYWORDS,
        Intent::Analyze => ANALYZE_KEYWORDS,
        Intent::Summary => SUMMARY_KEYWORDS,
        Intent::Latest => LATEST_KEYWORDS,
        Intent::Detail => DETAIL_KEYWORDS,
        Intent::Count => COUNT_KEYWORDS,
    }
}

/// Keyword-table intent classifier with entity extraction.
pub struct IntentClassifier {
    known_devices: Vec<String>,
}

impl IntentClassifier {
    /// Create a classifier recognizing the given device identifiers.
    pub fn new(known_devices: Vec<String>) -> Self {
        Self { known_devices }
    }

    /// Classify `text` into an intent, complexity, and entity slots.
    ///
    /// Intents are tried in priority order (troubleshoot first, count last),
    /// so when several keyword sets match, the more complex intent wins.
    pub fn classify(&self, text: &str) -> IntentResult {
        let lower = text.to_lowercase();

        let intent = Intent::iter()
            .find(|intent| Self::intent_matches(*intent, &lower))
            .unwrap_or(Intent::Summary);

        let periods = Self::mentioned_periods(&lower);
        let devices = self.mentioned_devices(&lower);
        let comparison = periods.len() >= 2
            || devices.len() >= 2
            || COMPARISON_CUES.iter().any(|c| keyword_matches(&lower, c));

        let mut entities = Entities::new();
        if let Some(device) = devices.first() {
            entities.insert(Slot::Device, device.clone());
        }
        if let Some(station) = Self::extract_station(text) {
            entities.insert(Slot::Station, station);
        }
        if let Some(period) = periods.first() {
            entities.insert(Slot::TimePeriod, period.to_string());
        }
        if let Some(result) = Self::extract_result(&lower) {
            entities.insert(Slot::Result, result.to_string());
        }

        debug!(
            intent = %intent,
            comparison,
            entities = entities.len(),
            "query classified"
        );

        IntentResult::new(intent, entities, comparison)
    }

    /// Classify an enriched follow-up.
    ///
    /// Intent and entities come from `effective`, which carries the
    /// remembered slots. Comparison cues are counted in `original` only, so
    /// a remembered period is never mistaken for a second one the user named.
    pub fn classify_enriched(&self, effective: &str, original: &str) -> IntentResult {
        let mut result = self.classify(effective);
        if effective != original {
            result.comparison = self.classify(original).comparison;
        }
        result
    }

    /// Distinct time periods named in `text`, in order of first mention.
    pub fn periods_in(text: &str) -> Vec<Period> {
        Self::mentioned_periods(&text.to_lowercase())
    }

    fn intent_matches(intent: Intent, lower: &str) -> bool {
        keywords_for(intent)
            .iter()
            .any(|kw| keyword_matches(lower, kw))
            || (intent == Intent::Count && COUNT_PATTERNS.iter().any(|re| re.is_match(lower)))
    }

    /// Distinct periods in order of first mention.
    fn mentioned_periods(lower: &str) -> Vec<Period> {
        let mut hits: Vec<(usize, Period)> = PERIOD_WORDS
            .iter()
            .filter_map(|(word, period)| keyword_position(lower, word).map(|pos| (pos, *period)))
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);

        let mut seen = BTreeSet::new();
        hits.into_iter()
            .filter_map(|(_, p)| seen.insert(p).then_some(p))
            .collect()
    }

    /// Known devices in order of first mention. Underscores may be written as spaces.
    fn mentioned_devices(&self, lower: &str) -> Vec<String> {
        let mut hits: Vec<(usize, &String)> = self
            .known_devices
            .iter()
            .filter_map(|device| {
                let canonical = device.to_lowercase();
                let spaced = canonical.replace('_', " ");
                lower
                    .find(&canonical)
                    .or_else(|| lower.find(&spaced))
                    .map(|pos| (pos, device))
            })
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);
        hits.into_iter().map(|(_, d)| d.clone()).collect()
    }

    fn extract_station(text: &str) -> Option<String> {
        let re = STATION_PATTERN.as_ref()?;
        let caps = re.captures(text)?;
        caps.get(1)
            .map(|m| m.as_str().to_uppercase())
            .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
    }

    fn extract_result(lower: &str) -> Option<&'static str> {
        if lower.contains("ไม่ผ่าน") {
            return Some("fail");
        }
        let mut tokens = lower.split(|c: char| !c.is_alphanumeric());
        let english = tokens.find_map(|t| {
            if t.starts_with("fail") || t == "ng" {
                Some("fail")
            } else if t.starts_with("pass") || t == "ok" {
                Some("pass")
            } else {
                None
            }
        });
        english.or_else(|| lower.contains("ผ่าน").then_some("pass"))
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(
            ["Basler_GigE", "Watashi_cam", "Camera_03"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::Complexity;

    fn classify(text: &str) -> IntentResult {
        IntentClassifier::default().classify(text)
    }

    #[test]
    fn how_many_today_is_simple_count() {
        let result = classify("how many inspections today");
        assert_eq!(result.intent, Intent::Count);
        assert_eq!(result.complexity, Complexity::Simple);
        assert!(!result.requires_reasoning);
        assert_eq!(result.entity(Slot::TimePeriod), Some("today"));
    }

    #[test]
    fn thai_count_patterns() {
        assert_eq!(classify("วันนี้ตรวจกี่ครั้ง").intent, Intent::Summary);
        assert_eq!(classify("มีการตรวจ 3 ครั้ง").intent, Intent::Count);
        assert_eq!(classify("จำนวนงาน").intent, Intent::Count);
    }

    #[test]
    fn troubleshoot_beats_everything() {
        let result = classify("why did Camera_03 fail, show me the latest details");
        assert_eq!(result.intent, Intent::Troubleshoot);
        assert_eq!(result.complexity, Complexity::Complex);
        assert_eq!(result.entity(Slot::Device), Some("Camera_03"));
        assert_eq!(result.entity(Slot::Result), Some("fail"));
    }

    #[test]
    fn analyze_beats_summary() {
        assert_eq!(classify("summary and trend analysis").intent, Intent::Analyze);
    }

    #[test]
    fn latest_beats_detail_and_count() {
        assert_eq!(classify("show the latest count").intent, Intent::Latest);
    }

    #[test]
    fn unmatched_defaults_to_summary() {
        let result = classify("hello there");
        assert_eq!(result.intent, Intent::Summary);
        assert_eq!(result.complexity, Complexity::Medium);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn ascii_keywords_need_word_boundaries() {
        assert!(!keyword_matches("install the prefix", "all"));
        assert!(!keyword_matches("install the prefix", "fix"));
        assert!(keyword_matches("show all", "all"));
        assert!(keyword_matches("what happened here?", "what happened"));
    }

    #[test]
    fn device_with_spaces_is_recognized() {
        let result = classify("latest from basler gige");
        assert_eq!(result.entity(Slot::Device), Some("Basler_GigE"));
    }

    #[test]
    fn station_extraction() {
        assert_eq!(
            classify("list failures at sta_581").entity(Slot::Station),
            Some("STA_581")
        );
        assert_eq!(
            classify("details for station 7").entity(Slot::Station),
            Some("7")
        );
    }

    #[test]
    fn two_periods_flag_comparison() {
        let result = classify("analyze today and yesterday");
        assert!(result.comparison);
        assert_eq!(result.entity(Slot::TimePeriod), Some("today"));
    }

    #[test]
    fn periods_in_keeps_mention_order() {
        assert_eq!(
            IntentClassifier::periods_in("Yesterday vs TODAY, and yesterday again"),
            vec![Period::Yesterday, Period::Today]
        );
        assert!(IntentClassifier::periods_in("no time words").is_empty());
    }

    #[test]
    fn two_devices_flag_comparison() {
        assert!(classify("analyze Camera_03 and Basler_GigE").comparison);
    }

    #[test]
    fn single_entity_analysis_has_no_comparison() {
        assert!(!classify("analyze the trend this week").comparison);
    }

    #[test]
    fn context_suffix_does_not_count_as_a_second_period() {
        let classifier = IntentClassifier::default();
        let original = "why did it fail yesterday";
        let effective = format!("{original}\n\n[Context: time period: today]");

        assert!(classifier.classify(&effective).comparison);
        let result = classifier.classify_enriched(&effective, original);
        assert!(!result.comparison);
        assert_eq!(result.intent, Intent::Troubleshoot);
        assert_eq!(result.entity(Slot::TimePeriod), Some("yesterday"));
    }

    #[test]
    fn enriched_comparison_keeps_the_users_own_cues() {
        let classifier = IntentClassifier::default();
        let original = "compare it with yesterday";
        let effective = format!("{original}\n\n[Context: device: Camera_03]");
        assert!(classifier.classify_enriched(&effective, original).comparison);
    }

    #[test]
    fn comparison_word_flags_comparison() {
        assert!(classify("compare pass rates").comparison);
        assert!(classify("เปรียบเทียบผล").comparison);
    }

    #[test]
    fn result_slot_detection() {
        assert_eq!(classify("list passed items").entity(Slot::Result), Some("pass"));
        assert_eq!(classify("แสดงที่ไม่ผ่าน").entity(Slot::Result), Some("fail"));
        assert_eq!(classify("แสดงที่ผ่าน").entity(Slot::Result), Some("pass"));
        assert_eq!(classify("show everything").entity(Slot::Result), None);
    }

    #[test]
    fn enriched_context_block_feeds_entities() {
        let result = classify("what about it\n\n[Context: device: Watashi_cam, time period: week]");
        assert_eq!(result.entity(Slot::Device), Some("Watashi_cam"));
        assert_eq!(result.entity(Slot::TimePeriod), Some("week"));
    }
}
