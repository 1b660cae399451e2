use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

/// Most suggestions shown under one answer.
pub const MAX_FOLLOW_UP_ACTIONS: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpCategory {
    Permit,
    Inspection,
    Application,
    Status,
    Document,
    Fee,
    Compliance,
    General,
}

impl FollowUpCategory {
    pub const ALL: [FollowUpCategory; 8] = [
        Self::Permit,
        Self::Inspection,
        Self::Application,
        Self::Status,
        Self::Document,
        Self::Fee,
        Self::Compliance,
        Self::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Inspection => "inspection",
            Self::Application => "application",
            Self::Status => "status",
            Self::Document => "document",
            Self::Fee => "fee",
            Self::Compliance => "compliance",
            Self::General => "general",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == value.trim())
    }
}

/// A suggested next prompt the user can send with one click.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpAction {
    /// Short button text, two to four words.
    pub label: String,
    /// The full message sent when the action is chosen.
    pub prompt: String,
    pub category: FollowUpCategory,
}

impl FollowUpAction {
    pub fn new(label: impl Into<String>, prompt: impl Into<String>, category: FollowUpCategory) -> Self {
        Self { label: label.into(), prompt: prompt.into(), category }
    }

    fn from_value(value: &Value) -> Option<Self> {
        let text = |key: &str| {
            value.get(key).and_then(Value::as_str).map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
        };
        let category = value.get("category").and_then(Value::as_str).and_then(FollowUpCategory::parse)?;
        Some(Self { label: text("label")?, prompt: text("prompt")?, category })
    }
}

/// Reads the model's suggestion list. The reply must be a JSON array, possibly
/// inside a markdown code fence. Entries missing a field or carrying an unknown
/// category are dropped; a list with nothing usable left is an error.
pub fn parse_follow_up_actions(reply: &str) -> Result<Vec<FollowUpAction>, DomainError> {
    let body = strip_code_fence(reply);
    let items = match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => items,
        Ok(_) => return Err(DomainError::MalformedResponse("follow-up actions are not a JSON array".to_string())),
        Err(error) => {
            return Err(DomainError::MalformedResponse(format!("follow-up actions are not JSON: {error}")));
        }
    };

    let actions = items
        .iter()
        .filter_map(FollowUpAction::from_value)
        .take(MAX_FOLLOW_UP_ACTIONS)
        .collect::<Vec<_>>();
    if actions.is_empty() {
        return Err(DomainError::MalformedResponse("no usable follow-up actions".to_string()));
    }
    Ok(actions)
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

/// Shown when the model cannot produce usable suggestions.
pub fn default_follow_up_actions() -> Vec<FollowUpAction> {
    use FollowUpCategory::*;

    vec![
        FollowUpAction::new(
            "Apply for Permit",
            "I want to apply for a permit. Can you guide me through the application process?",
            Application,
        ),
        FollowUpAction::new(
            "Check Status",
            "I need to check the status of my permit or application. How can I do this?",
            Status,
        ),
        FollowUpAction::new(
            "Schedule Inspection",
            "I need to schedule an inspection for my permit. What are the next steps?",
            Inspection,
        ),
        FollowUpAction::new(
            "Document Requirements",
            "What documents do I need to submit for my permit application?",
            Document,
        ),
        FollowUpAction::new("Calculate Fees", "How much will my permit cost? Can you help me calculate the fees?", Fee),
        FollowUpAction::new("Get Help", "I need additional assistance with my permit questions.", General),
    ]
}
