//! In-memory demo data behind the provider traits. Nothing outside this
//! module depends on the fixture content.

use crate::model::{
    Exercise, Goal, GoalKind, ProfileConstraints, UserProfile, WorkoutSession,
};
use crate::providers::{ExerciseCatalog, HistoryProvider, ProfileProvider, RmProvider};

pub struct DemoProfiles;

impl ProfileProvider for DemoProfiles {
    fn profile(&self, user_id: &str) -> Option<UserProfile> {
        match user_id {
            "demo_user" => Some(UserProfile {
                user_id: "demo_user".to_string(),
                name: "Demo Lifter".to_string(),
                training_level: "intermediate".to_string(),
                goal: Goal {
                    primary: GoalKind::Strength,
                    secondary: Some("hypertrophy".to_string()),
                },
                constraints: ProfileConstraints {
                    session_minutes: 60,
                    injuries: vec!["knee_sensitivity".to_string()],
                },
            }),
            "user_123" => Some(UserProfile {
                user_id: "user_123".to_string(),
                name: "User 123".to_string(),
                training_level: "beginner".to_string(),
                goal: Goal {
                    primary: GoalKind::FatLoss,
                    secondary: Some("fitness".to_string()),
                },
                constraints: ProfileConstraints {
                    session_minutes: 45,
                    injuries: Vec::new(),
                },
            }),
            _ => None,
        }
    }
}

pub struct DemoHistory;

impl HistoryProvider for DemoHistory {
    fn sessions(&self, user_id: &str) -> Vec<WorkoutSession> {
        let session = |id: &str, date: &str, title: &str, duration: u32, rpe: f64| WorkoutSession {
            session_id: id.to_string(),
            date: date.to_string(),
            title: title.to_string(),
            duration_min: duration,
            perceived_exertion_rpe: Some(rpe),
        };
        match user_id {
            "demo_user" => vec![
                session("s_2026_01_26", "2026-01-26", "Upper A", 62, 8.0),
                session("s_2026_01_24", "2026-01-24", "Lower A", 58, 8.0),
                session("s_2026_01_22", "2026-01-22", "Upper B", 55, 7.5),
            ],
            "user_123" => vec![session("s_2026_01_25", "2026-01-25", "Full Body", 44, 7.0)],
            _ => Vec::new(),
        }
    }
}

pub struct DemoCatalog {
    entries: Vec<Exercise>,
}

impl DemoCatalog {
    pub fn new() -> Self {
        let entry = |id: i64, key: &str, name: &str, group: &str, knee_friendly: bool| Exercise {
            id,
            key: key.to_string(),
            name: name.to_string(),
            group: group.to_string(),
            knee_friendly,
        };
        Self {
            entries: vec![
                entry(101, "bench_press", "Bench Press", "upper_push", true),
                entry(102, "ohp", "Overhead Press", "upper_push", true),
                entry(103, "barbell_row", "Barbell Row", "upper_pull", true),
                entry(104, "pull_up", "Pull-Up", "upper_pull", true),
                entry(201, "back_squat", "Back Squat", "lower_squat", false),
                entry(202, "box_squat", "Box Squat", "lower_squat", true),
                entry(203, "trap_bar_deadlift", "Trap Bar Deadlift", "lower_hinge", true),
                entry(204, "rdl", "Romanian Deadlift", "lower_hinge", true),
                entry(205, "leg_curl", "Leg Curl", "lower_accessory", true),
                entry(206, "split_squat", "Bulgarian Split Squat", "lower_accessory", true),
            ],
        }
    }
}

impl Default for DemoCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExerciseCatalog for DemoCatalog {
    fn all(&self) -> Vec<Exercise> {
        self.entries.clone()
    }

    fn by_key(&self, key: &str) -> Option<Exercise> {
        self.entries.iter().find(|e| e.key == key).cloned()
    }

    fn by_id(&self, id: i64) -> Option<Exercise> {
        self.entries.iter().find(|e| e.id == id).cloned()
    }
}

pub struct DemoRms;

impl RmProvider for DemoRms {
    fn one_rm(&self, user_id: &str, exercise_id: i64) -> Option<f64> {
        if user_id != "demo_user" {
            return None;
        }
        match exercise_id {
            101 => Some(120.0),
            102 => Some(72.0),
            103 => Some(130.0),
            // Pull-up is tracked as bodyweight: zero means no barbell load.
            104 => Some(0.0),
            201 => Some(165.0),
            202 => Some(155.0),
            203 => Some(190.0),
            204 => Some(150.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lookups_agree() {
        let catalog = DemoCatalog::new();
        assert_eq!(catalog.all().len(), 10);
        let squat = catalog.by_key("back_squat").unwrap();
        assert!(!squat.knee_friendly);
        assert_eq!(catalog.by_id(squat.id).unwrap().key, "back_squat");
    }

    #[test]
    fn zero_rm_is_reported_as_recorded() {
        assert_eq!(DemoRms.one_rm("demo_user", 104), Some(0.0));
        assert_eq!(DemoRms.one_rm("user_123", 101), None);
    }
}
