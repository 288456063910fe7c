//! Prompt definitions compiled into the binary.

/// Prompt used to judge and rewrite the user's question.
pub const REWRITE_PROMPT_ID: &str = "chat.rewrite";

/// Prompt used to generate the grounded answer.
pub const ANSWER_PROMPT_ID: &str = "chat.answer";

const REWRITE_PROMPT_YAML: &str = include_str!("../prompts/chat.rewrite.yml");
const ANSWER_PROMPT_YAML: &str = include_str!("../prompts/chat.answer.yml");

/// Raw YAML of a built-in prompt, if one exists for `prompt_id`.
pub fn builtin_prompt_source(prompt_id: &str) -> Option<&'static str> {
    match prompt_id {
        REWRITE_PROMPT_ID => Some(REWRITE_PROMPT_YAML),
        ANSWER_PROMPT_ID => Some(ANSWER_PROMPT_YAML),
        _ => None,
    }
}

/// IDs of every built-in prompt.
pub fn builtin_prompt_ids() -> &'static [&'static str] {
    &[REWRITE_PROMPT_ID, ANSWER_PROMPT_ID]
}
