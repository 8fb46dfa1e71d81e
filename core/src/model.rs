use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the exercise catalog. Static, externally owned data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: i64,
    /// Stable machine key, e.g. "bench_press"
    pub key: String,
    /// Display name, e.g. "Bench Press"
    pub name: String,
    /// Movement group, e.g. "upper_push", "lower_squat"
    pub group: String,
    /// Whether the movement is suitable for knee-sensitive lifters
    pub knee_friendly: bool,
}

/// Primary training goal. Closed set — the synthesis template only
/// distinguishes strength from everything else, but the full set is part of
/// the tool contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Strength,
    Hypertrophy,
    FatLoss,
    Fitness,
}

impl GoalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalKind::Strength => "strength",
            GoalKind::Hypertrophy => "hypertrophy",
            GoalKind::FatLoss => "fat_loss",
            GoalKind::Fitness => "fitness",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub primary: GoalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

/// A user's training profile as served by the profile provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub training_level: String,
    pub goal: Goal,
    pub constraints: ProfileConstraints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConstraints {
    pub session_minutes: u32,
    pub injuries: Vec<String>,
}

/// A logged workout session from the history provider. Dates are plain
/// `YYYY-MM-DD` strings; anything else is treated as unparseable downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub session_id: String,
    pub date: String,
    pub title: String,
    pub duration_min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perceived_exertion_rpe: Option<f64>,
}

/// Input to program synthesis, as validated from the `create_program` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramRequest {
    /// Raw requested training days; clamped to [1, 7] during synthesis.
    pub days_per_week: i64,
    pub session_minutes: u32,
    pub goal: Goal,
    #[serde(default)]
    pub constraints: ProgramConstraints,
    /// Accepted for forward compatibility; not yet consulted in selection.
    #[serde(default)]
    pub preferred_exercise_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramConstraints {
    #[serde(default)]
    pub knee_sensitive: bool,
    /// Callers may attach further constraint hints; they are echoed through
    /// plan metadata untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Machine-readable weekly plan. Serialized verbatim into the tool payload.
#[derive(Debug, Clone, Serialize)]
pub struct ProgramPlan {
    pub program_id: String,
    pub user_id: String,
    pub meta: ProgramMeta,
    pub days: Vec<DayPlan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramMeta {
    /// Clamped value actually used for template truncation.
    pub days_per_week: i64,
    pub session_minutes: u32,
    pub goal: Goal,
    pub constraints: ProgramConstraints,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub day_name: String,
    pub estimated_minutes: u32,
    pub items: Vec<PrescriptionItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Main,
    Accessory,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionItem {
    pub exercise_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub prescription: Prescription,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prescription {
    pub sets: u32,
    pub reps: RepScheme,
    pub intensity: Intensity,
    /// Always a multiple of 2.5 when present. Absent for accessories and for
    /// main lifts without a recorded one-rep-max.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_weight_kg: Option<f64>,
}

/// Main lifts prescribe a fixed rep count; accessories a range like "8-10".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RepScheme {
    Count(u32),
    Range(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intensity {
    #[serde(rename = "percent_1rm")]
    Percent1Rm { value: f64 },
    Rpe { value: f64 },
}
