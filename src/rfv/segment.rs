use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "Champions")]
    Champions,
    #[serde(rename = "Loyal")]
    Loyal,
    #[serde(rename = "Potential Loyal")]
    PotentialLoyal,
    #[serde(rename = "New")]
    New,
    #[serde(rename = "Promising")]
    Promising,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Cannot Lose")]
    CannotLose,
    #[serde(rename = "Hibernating")]
    Hibernating,
    #[serde(rename = "Almost Sleeping")]
    AlmostSleeping,
    #[serde(rename = "Other")]
    Other,
}

impl Segment {
    pub fn label(self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::Loyal => "Loyal",
            Segment::PotentialLoyal => "Potential Loyal",
            Segment::New => "New",
            Segment::Promising => "Promising",
            Segment::NeedsAttention => "Needs Attention",
            Segment::AtRisk => "At Risk",
            Segment::CannotLose => "Cannot Lose",
            Segment::Hibernating => "Hibernating",
            Segment::AlmostSleeping => "Almost Sleeping",
            Segment::Other => "Other",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Recency / frequency / value scores, each in 1..=5 (5 is best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scores {
    pub recency: u8,
    pub frequency: u8,
    pub value: u8,
}

impl Scores {
    pub fn new(recency: u8, frequency: u8, value: u8) -> Self {
        Self {
            recency,
            frequency,
            value,
        }
    }

    /// Elementwise max, used when two records of the same customer are merged.
    pub fn max(self, other: Scores) -> Scores {
        Scores {
            recency: self.recency.max(other.recency),
            frequency: self.frequency.max(other.frequency),
            value: self.value.max(other.value),
        }
    }

    fn average(self) -> f64 {
        (f64::from(self.recency) + f64::from(self.frequency) + f64::from(self.value)) / 3.0
    }
}

type Rule = (fn(Scores) -> bool, Segment);

// Rules overlap; first match wins, so the order is part of the contract.
const RULES: &[Rule] = &[
    (
        |s| s.recency >= 4 && s.frequency >= 4 && s.value >= 4,
        Segment::Champions,
    ),
    (
        |s| s.recency >= 3 && s.frequency >= 3 && s.value >= 3,
        Segment::Loyal,
    ),
    (
        |s| s.recency >= 4 && s.frequency <= 2 && s.value >= 3,
        Segment::PotentialLoyal,
    ),
    (|s| s.recency >= 4 && s.frequency <= 2, Segment::New),
    (
        |s| s.recency >= 3 && (s.frequency >= 2 || s.value >= 2),
        Segment::Promising,
    ),
    (
        |s| s.recency <= 2 && s.frequency >= 3 && s.value >= 3,
        Segment::NeedsAttention,
    ),
    (
        |s| s.recency <= 2 && s.frequency >= 2 && s.value >= 2,
        Segment::AtRisk,
    ),
    (|s| s.recency <= 2 && s.value >= 4, Segment::CannotLose),
    (|s| s.average() <= 2.0, Segment::Hibernating),
    (
        |s| s.recency <= 2 && s.average() <= 3.0,
        Segment::AlmostSleeping,
    ),
];

pub fn classify(scores: Scores) -> Segment {
    RULES
        .iter()
        .find(|(matches, _)| matches(scores))
        .map(|(_, segment)| *segment)
        .unwrap_or(Segment::Other)
}
