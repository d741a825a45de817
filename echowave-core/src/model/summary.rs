use serde::{Deserialize, Serialize};

/// Result of summarizing a finished conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub title: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
}

impl Summary {
    /// Fixed result for a conversation in which nothing was said.
    pub fn silence() -> Self {
        Self {
            title: "A Moment of Silence".to_string(),
            key_points: vec!["No words were spoken, but the silence was profound.".to_string()],
            action_items: Vec::new(),
        }
    }

    /// Fixed result when the summarization service could not be used.
    pub fn failed() -> Self {
        Self {
            title: "Summary Failed".to_string(),
            key_points: vec!["Could not generate a summary for this conversation.".to_string()],
            action_items: Vec::new(),
        }
    }
}
