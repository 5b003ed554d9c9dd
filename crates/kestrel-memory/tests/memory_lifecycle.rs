// SPDX-FileCopyrightText: 2026 Kestrel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarize, store, persist, and reload long-term memory.

use chrono::Utc;
use kestrel_context::ConversationExchange;
use kestrel_core::{Intent, IntentResult, Slot};
use kestrel_memory::summarizer::heuristic_summary;
use kestrel_memory::{
    JsonFilePersistence, LongTermMemory, MemoryPersistence, SummaryTier,
};

fn exchange(text: &str, device: &str) -> ConversationExchange {
    ConversationExchange {
        user_text: text.to_string(),
        effective_text: text.to_string(),
        answer: "answer".to_string(),
        intent: IntentResult::new(
            Intent::Troubleshoot,
            [(Slot::Device, device.to_string())].into_iter().collect(),
            false,
        ),
        followup: false,
        timestamp: Utc::now(),
    }
}

#[tokio::test]
async fn heuristic_knowledge_survives_a_restart() {
    let window: Vec<ConversationExchange> = (0..4)
        .map(|i| exchange(&format!("why did Camera_03 fail {i}"), "Camera_03"))
        .collect();

    let mut memory = LongTermMemory::new(100, 50);
    memory.apply(heuristic_summary(&window, SummaryTier::Daily));

    let relevant = memory.get_relevant_memories("Camera_03 problems", 5);
    assert!(
        relevant
            .insights
            .iter()
            .any(|i| i.text == "Device Camera_03 was discussed 4 times")
    );
    assert_eq!(
        relevant.recent_summary.as_ref().map(|s| s.summary.as_str()),
        Some("Summary of 4 conversations (daily)")
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memories.json");
    JsonFilePersistence
        .save(&path, &memory.snapshot())
        .await
        .unwrap();

    let mut reloaded = LongTermMemory::new(100, 50);
    reloaded.restore(JsonFilePersistence.load(&path).await.unwrap());
    assert_eq!(reloaded.stats().insights, memory.stats().insights);
    assert_eq!(
        reloaded.consolidate_knowledge().frequent_patterns,
        vec!["User repeatedly focuses on Camera_03 (seen 1x)"]
    );
}
