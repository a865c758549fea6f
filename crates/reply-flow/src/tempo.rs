//! Per-character insertion plan with randomized pacing, so composed content
//! arrives at a human rhythm instead of one bulk write.

use replypilot_core_types::DelayRange;

#[derive(Clone, Debug, Default)]
pub struct TypingPlan {
    pub steps: Vec<TypingStep>,
}

#[derive(Clone, Debug)]
pub struct TypingStep {
    pub chunk: String,
    pub delay_ms: u64,
}

pub fn build_typing_plan(text: &str, per_char: DelayRange) -> TypingPlan {
    TypingPlan {
        steps: text
            .chars()
            .map(|ch| TypingStep {
                chunk: ch.to_string(),
                delay_ms: per_char.sample().as_millis() as u64,
            })
            .collect(),
    }
}
