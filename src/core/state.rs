use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::story::Story;

/// Story builder steps, in the only order they can be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WizardStep {
    #[default]
    Title,
    Genre,
    Character,
    Story,
    Preview,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::Title,
        WizardStep::Genre,
        WizardStep::Character,
        WizardStep::Story,
        WizardStep::Preview,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    pub fn label(self) -> &'static str {
        match self {
            WizardStep::Title => "Title",
            WizardStep::Genre => "Genre",
            WizardStep::Character => "Characters",
            WizardStep::Story => "Chapters",
            WizardStep::Preview => "Preview",
        }
    }
}

/// The single per-user autosave record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDraft {
    pub data: Story,
    pub last_step: WizardStep,
    pub updated_at: DateTime<Utc>,
}

impl StoryDraft {
    pub fn new(data: Story, last_step: WizardStep) -> Self {
        Self {
            data,
            last_step,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_strictly_sequential() {
        assert_eq!(WizardStep::Title.previous(), None);
        assert_eq!(WizardStep::Title.next(), Some(WizardStep::Genre));
        assert_eq!(WizardStep::Story.next(), Some(WizardStep::Preview));
        assert_eq!(WizardStep::Preview.next(), None);
        assert_eq!(WizardStep::Preview.previous(), Some(WizardStep::Story));
        assert!(WizardStep::Preview.is_last());
        for (i, step) in WizardStep::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
        }
    }

    #[test]
    fn test_draft_envelope_json_shape() {
        let draft = StoryDraft::new(Story::new(), WizardStep::Character);
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["lastStep"], "character");
        assert!(value["updatedAt"].is_string());
        assert!(value["data"]["chapters"].is_array());
    }
}
