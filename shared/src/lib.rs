//! Row schema shared by every storage backend and every consumer.
//!
//! Field names here are the column names of the SQLite tables and the JSON
//! field names of the flat key-value documents. Enumerated fields are closed
//! sets of string tags so both serializations stay readable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Progress state of a single concept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptStatus {
    /// Listed but never opened
    Unseen,
    /// Opened at least once, not finished
    Exploring,
    /// Finished
    Explored,
    /// Finished and marked as personally meaningful
    Resonates,
}

impl ConceptStatus {
    pub const ALL: [ConceptStatus; 4] = [
        ConceptStatus::Unseen,
        ConceptStatus::Exploring,
        ConceptStatus::Explored,
        ConceptStatus::Resonates,
    ];

    /// Tag used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ConceptStatus::Unseen => "unseen",
            ConceptStatus::Exploring => "exploring",
            ConceptStatus::Explored => "explored",
            ConceptStatus::Resonates => "resonates",
        }
    }
}

/// What the user wants out of the app, chosen during onboarding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningGoal {
    Fluency,
    Curiosity,
    Career,
    PersonalGrowth,
}

impl LearningGoal {
    pub const ALL: [LearningGoal; 4] = [
        LearningGoal::Fluency,
        LearningGoal::Curiosity,
        LearningGoal::Career,
        LearningGoal::PersonalGrowth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningGoal::Fluency => "fluency",
            LearningGoal::Curiosity => "curiosity",
            LearningGoal::Career => "career",
            LearningGoal::PersonalGrowth => "personal_growth",
        }
    }
}

/// Self-reported familiarity with the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComfortLevel {
    #[default]
    Beginner,
    Familiar,
    Confident,
}

impl ComfortLevel {
    pub const ALL: [ComfortLevel; 3] = [
        ComfortLevel::Beginner,
        ComfortLevel::Familiar,
        ComfortLevel::Confident,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComfortLevel::Beginner => "beginner",
            ComfortLevel::Familiar => "familiar",
            ComfortLevel::Confident => "confident",
        }
    }
}

/// Error returned when a stored or user-supplied tag is not part of its closed set
#[derive(Debug, Clone, PartialEq)]
pub struct TagParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for TagParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} tag: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for TagParseError {}

macro_rules! tag_conversions {
    ($ty:ident, $kind:literal) => {
        impl FromStr for $ty {
            type Err = TagParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.as_str() == s)
                    .ok_or_else(|| TagParseError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

tag_conversions!(ConceptStatus, "concept status");
tag_conversions!(LearningGoal, "learning goal");
tag_conversions!(ComfortLevel, "comfort level");

/// The singleton onboarding record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnboardingState {
    pub completed: bool,
    pub goal: Option<LearningGoal>,
    pub comfort_level: ComfortLevel,
    pub first_concept_viewed: bool,
}

/// Partial onboarding change; `None` leaves the stored field as it is
///
/// `goal` is doubly optional: `Some(None)` clears the goal, `None` keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnboardingUpdate {
    pub completed: Option<bool>,
    pub goal: Option<Option<LearningGoal>>,
    pub comfort_level: Option<ComfortLevel>,
    pub first_concept_viewed: Option<bool>,
}

impl OnboardingUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn goal(mut self, goal: Option<LearningGoal>) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn comfort_level(mut self, comfort_level: ComfortLevel) -> Self {
        self.comfort_level = Some(comfort_level);
        self
    }

    pub fn first_concept_viewed(mut self, viewed: bool) -> Self {
        self.first_concept_viewed = Some(viewed);
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Per-concept progress row, created lazily on first interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConcept {
    pub concept_id: String,
    pub status: ConceptStatus,
    pub explored_at: Option<String>, // RFC 3339 timestamp, set once
    pub updated_at: String,          // RFC 3339 timestamp
}

/// A user-authored note, optionally tied to a concept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub concept_id: Option<String>,
    pub content: String,
    pub created_at: String, // RFC 3339 timestamp
    pub updated_at: String, // RFC 3339 timestamp
}

/// A single scalar preference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Live aggregate counts over user concepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub explored: u64,
    pub resonates: u64,
}

/// Full export of the persisted state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub onboarding: OnboardingState,
    pub user_concepts: Vec<UserConcept>,
    pub journal_entries: Vec<JournalEntry>,
    pub settings: BTreeMap<String, String>,
}
