// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up question detection.

use kestrel_core::{IntentResult, Slot};
use kestrel_router::keyword_matches;

/// Thai continuation and referential markers, matched as substrings.
const THAI_MARKERS: &[&str] = &[
    "แล้ว", "ล่ะ", "อีก", "ต่อ", "เพิ่ม", "ด้วย", "อันนั้น", "อันนี้", "มัน", "ตัวนั้น", "นั่น",
    "นี่", "เหมือนกัน", "เช่นกัน",
];

/// English continuation and referential markers, matched on word boundaries.
const ENGLISH_MARKERS: &[&str] = &[
    "also", "too", "and", "what about", "how about", "that", "this", "it", "them", "those",
    "same", "similar",
];

/// Queries at or under this many words that name no referent are follow-ups.
const SHORT_QUERY_WORDS: usize = 5;

/// Returns true when `raw` reads as a continuation of the previous exchange.
///
/// `raw_intent` is the classification of the raw text, used to check
/// whether the query already names a device, station, or time period.
pub fn is_followup(raw: &str, raw_intent: &IntentResult) -> bool {
    let lower = raw.to_lowercase();

    if THAI_MARKERS.iter().any(|m| lower.contains(m))
        || ENGLISH_MARKERS.iter().any(|m| keyword_matches(&lower, m))
    {
        return true;
    }

    let has_referent = [Slot::Device, Slot::Station, Slot::TimePeriod]
        .iter()
        .any(|slot| raw_intent.entity(*slot).is_some());

    !has_referent && raw.split_whitespace().count() <= SHORT_QUERY_WORDS
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_router::IntentClassifier;

    fn followup(text: &str) -> bool {
        let classifier = IntentClassifier::default();
        is_followup(text, &classifier.classify(text))
    }

    #[test]
    fn english_markers() {
        assert!(followup("what about yesterday"));
        assert!(followup("show me those again please for the line"));
        assert!(followup("is it the same for Camera_03 this month at every station"));
    }

    #[test]
    fn markers_need_word_boundaries() {
        // "it" inside "inspections" and "and" inside "standard" must not count.
        assert!(!followup("list the standard inspections for Camera_03 on every line today"));
    }

    #[test]
    fn thai_markers() {
        assert!(followup("แล้วเมื่อวานล่ะ"));
    }

    #[test]
    fn short_query_without_referent() {
        assert!(followup("how many failed"));
        assert!(!followup("how many failed today"));
        assert!(!followup("latest on Basler_GigE"));
    }

    #[test]
    fn long_self_contained_query_is_not_followup() {
        assert!(!followup("how many inspections were done on Watashi_cam during the week"));
    }
}
