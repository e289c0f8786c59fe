use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// MoSCoW priority bucket for a feature.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MoscowPriority {
    Must,
    Should,
    Could,
    // Models sometimes spell the bucket with the apostrophe.
    #[strum(serialize = "won't", to_string = "wont")]
    Wont,
}

/// AI assessment of one feature: five quality scores (1-5) plus a suggested
/// MoSCoW bucket. These six fields are what gets written back to the ticket
/// store alongside an analyzed-at timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureAnalysis {
    pub engineering_score: u8,
    pub clarity_score: u8,
    pub completeness_score: u8,
    pub implementability_score: u8,
    pub overall_score: u8,
    pub suggested_priority: MoscowPriority,
}
