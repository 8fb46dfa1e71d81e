//! Deterministic weekly-program synthesis. Pure: everything it reads comes
//! in through arguments, identifier generation included.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::CoreError;
use crate::model::{
    DayPlan, Exercise, GoalKind, Intensity, ItemKind, Prescription, PrescriptionItem, ProgramMeta,
    ProgramPlan, ProgramRequest, RepScheme,
};
use crate::providers::{ExerciseCatalog, RmProvider};

/// Program identifier generation, injected so tests can pin ids.
pub trait ProgramIdSource: Send + Sync {
    fn program_id(&self, created_at: DateTime<Utc>) -> String;
}

/// Date-stamped id with a random disambiguator, e.g. `prog_20260126_4821`.
pub struct RandomProgramIds;

impl ProgramIdSource for RandomProgramIds {
    fn program_id(&self, created_at: DateTime<Utc>) -> String {
        let nonce: u32 = rand::thread_rng().gen_range(0..10_000);
        format!("prog_{}_{nonce}", created_at.format("%Y%m%d"))
    }
}

pub struct ProgramOutput {
    pub plan: ProgramPlan,
    pub summary_text: String,
}

/// Round a load to the nearest 2.5 kg plate increment.
pub fn round_to_2p5(x: f64) -> f64 {
    (x / 2.5).round() * 2.5
}

/// Build the weekly plan for `user_id`. The template is a fixed four-slot
/// Upper/Lower split truncated to the clamped day count; main lifts load from
/// positive one-rep-max data, accessories are effort-rated.
pub fn build_program(
    user_id: &str,
    request: &ProgramRequest,
    catalog: &dyn ExerciseCatalog,
    rm: &dyn RmProvider,
    ids: &dyn ProgramIdSource,
    now: DateTime<Utc>,
) -> Result<ProgramOutput, CoreError> {
    let knee_sensitive = request.constraints.knee_sensitive;

    let need = |key: &'static str| catalog.by_key(key).ok_or(CoreError::MissingExercise { key });

    // Squat slot: knee-sensitive lifters always get the knee-friendly
    // variant; otherwise prefer the back squat when the catalog has it.
    let squat = if knee_sensitive {
        need("box_squat")?
    } else {
        match catalog.by_key("back_squat") {
            Some(exercise) => exercise,
            None => need("box_squat")?,
        }
    };
    let bench = need("bench_press")?;
    let ohp = need("ohp")?;
    let dead = need("trap_bar_deadlift")?;
    let row = need("barbell_row")?;
    let pull_up = need("pull_up")?;
    let rdl = need("rdl")?;
    let leg_curl = need("leg_curl")?;
    let split_squat = need("split_squat")?;

    // Zero never counts as a known load.
    let one_rm = |exercise: &Exercise| rm.one_rm(user_id, exercise.id).filter(|v| *v > 0.0);

    let main_set = |exercise: &Exercise, sets: u32, reps: u32, pct: f64| {
        let prescription = match one_rm(exercise) {
            Some(load) => Prescription {
                sets,
                reps: RepScheme::Count(reps),
                intensity: Intensity::Percent1Rm { value: pct },
                target_weight_kg: Some(round_to_2p5(load * pct)),
            },
            None => Prescription {
                sets,
                reps: RepScheme::Count(reps),
                intensity: Intensity::Rpe { value: 7.5 },
                target_weight_kg: None,
            },
        };
        PrescriptionItem {
            exercise_id: exercise.id,
            name: exercise.name.clone(),
            kind: ItemKind::Main,
            prescription,
        }
    };

    let accessory = |exercise: &Exercise, sets: u32, reps: &str, rpe: f64| PrescriptionItem {
        exercise_id: exercise.id,
        name: exercise.name.clone(),
        kind: ItemKind::Accessory,
        prescription: Prescription {
            sets,
            reps: RepScheme::Range(reps.to_string()),
            intensity: Intensity::Rpe { value: rpe },
            target_weight_kg: None,
        },
    };

    let strength = request.goal.primary == GoalKind::Strength;
    let bench_pct = if strength { 0.82 } else { 0.75 };
    let squat_pct = if strength { 0.80 } else { 0.72 };
    let dead_pct = if strength { 0.80 } else { 0.70 };
    let ohp_pct = if strength { 0.78 } else { 0.70 };

    let session_minutes = request.session_minutes;
    let template = vec![
        DayPlan {
            day_name: "Upper A".to_string(),
            estimated_minutes: session_minutes,
            items: vec![
                main_set(&bench, 5, if strength { 3 } else { 6 }, bench_pct),
                main_set(&ohp, 3, 6, ohp_pct),
                accessory(&row, 4, "8-10", 8.0),
                accessory(&pull_up, 3, "6-10", 8.0),
            ],
        },
        DayPlan {
            day_name: "Lower A".to_string(),
            estimated_minutes: session_minutes,
            items: vec![
                main_set(&squat, 5, if strength { 4 } else { 6 }, squat_pct),
                accessory(&rdl, 4, "6-10", 8.0),
                accessory(&leg_curl, 3, "10-15", 8.0),
                accessory(&split_squat, 3, "8-12/side", 7.5),
            ],
        },
        DayPlan {
            day_name: "Upper B".to_string(),
            estimated_minutes: session_minutes,
            items: vec![
                main_set(
                    &bench,
                    4,
                    if strength { 4 } else { 8 },
                    if strength { 0.78 } else { 0.70 },
                ),
                accessory(&row, 4, "8-12", 8.0),
                accessory(&pull_up, 4, "6-10", 8.0),
                accessory(&ohp, 2, "8-10", 7.5),
            ],
        },
        DayPlan {
            day_name: "Lower B".to_string(),
            estimated_minutes: session_minutes,
            items: vec![
                main_set(&dead, 4, if strength { 3 } else { 5 }, dead_pct),
                accessory(&rdl, 3, "8-10", 8.0),
                accessory(&leg_curl, 3, "10-15", 8.0),
                accessory(&split_squat, 2, "10-12/side", 7.5),
            ],
        },
    ];

    // More than four requested days still yields four: the template is
    // truncated, never repeated or scaled.
    let days_per_week = request.days_per_week.clamp(1, 7);
    let days: Vec<DayPlan> = template
        .into_iter()
        .take(days_per_week as usize)
        .collect();

    let plan = ProgramPlan {
        program_id: ids.program_id(now),
        user_id: user_id.to_string(),
        meta: ProgramMeta {
            days_per_week,
            session_minutes,
            goal: request.goal.clone(),
            constraints: request.constraints.clone(),
            created_at: now,
        },
        days,
    };

    let summary_text = render_summary(&plan, knee_sensitive.then_some(squat.name.as_str()));
    Ok(ProgramOutput { plan, summary_text })
}

fn render_summary(plan: &ProgramPlan, knee_variant: Option<&str>) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Program: {} sessions/week, {} min, goal {} + {}.",
        plan.meta.days_per_week,
        plan.meta.session_minutes,
        plan.meta.goal.primary.as_str(),
        plan.meta.goal.secondary.as_deref().unwrap_or("-"),
    ));
    if let Some(name) = knee_variant {
        lines.push(format!(
            "Knee: using the knee-friendly squat variant ({name})."
        ));
    }

    for day in &plan.days {
        let mains: Vec<&str> = day
            .items
            .iter()
            .filter(|item| item.kind == ItemKind::Main)
            .map(|item| item.name.as_str())
            .collect();
        let accessories = day
            .items
            .iter()
            .filter(|item| item.kind == ItemKind::Accessory)
            .count();
        lines.push(format!(
            "- {}: main lifts {}; accessories {}",
            day.day_name,
            mains.join(", "),
            accessories,
        ));
    }

    let weights: Vec<String> = plan
        .days
        .iter()
        .flat_map(|day| &day.items)
        .filter(|item| item.kind == ItemKind::Main)
        .filter_map(|item| item.prescription.target_weight_kg)
        .map(|w| w.to_string())
        .collect();
    if weights.is_empty() {
        lines.push(
            "Main-lift target weights (kg): RPE-based (no RM data for some lifts)".to_string(),
        );
    } else {
        lines.push(format!(
            "Main-lift target weights (kg): {}",
            weights.join(", ")
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Goal, ProgramConstraints};
    use crate::providers::Providers;
    use chrono::TimeZone;

    struct FixedIds;

    impl ProgramIdSource for FixedIds {
        fn program_id(&self, created_at: DateTime<Utc>) -> String {
            format!("prog_{}_0000", created_at.format("%Y%m%d"))
        }
    }

    fn request(days: i64, primary: GoalKind, knee_sensitive: bool) -> ProgramRequest {
        ProgramRequest {
            days_per_week: days,
            session_minutes: 60,
            goal: Goal {
                primary,
                secondary: None,
            },
            constraints: ProgramConstraints {
                knee_sensitive,
                extra: serde_json::Map::new(),
            },
            preferred_exercise_ids: Vec::new(),
        }
    }

    fn build(user_id: &str, request: &ProgramRequest) -> ProgramOutput {
        let providers = Providers::demo();
        let now = Utc.with_ymd_and_hms(2026, 1, 26, 12, 0, 0).unwrap();
        build_program(
            user_id,
            request,
            providers.catalog.as_ref(),
            providers.rm.as_ref(),
            &FixedIds,
            now,
        )
        .unwrap()
    }

    #[test]
    fn knee_sensitive_plan_never_uses_back_squat() {
        let out = build("demo_user", &request(4, GoalKind::Strength, true));
        let lower_a = &out.plan.days[1];
        let main = &lower_a.items[0];
        assert_eq!(main.name, "Box Squat");
        // 155 RM x 0.80 rounded to the nearest 2.5
        assert_eq!(main.prescription.target_weight_kg, Some(125.0));
        assert!(out.summary_text.contains("knee-friendly squat variant"));
        for day in &out.plan.days {
            assert!(day.items.iter().all(|item| item.name != "Back Squat"));
        }
    }

    #[test]
    fn default_plan_prefers_back_squat() {
        let out = build("demo_user", &request(4, GoalKind::Strength, false));
        let main = &out.plan.days[1].items[0];
        assert_eq!(main.name, "Back Squat");
        // 165 RM x 0.80 = 132 -> 132.5
        assert_eq!(main.prescription.target_weight_kg, Some(132.5));
    }

    #[test]
    fn target_weights_are_plate_multiples() {
        for goal in [GoalKind::Strength, GoalKind::Hypertrophy] {
            let out = build("demo_user", &request(4, goal, false));
            for item in out.plan.days.iter().flat_map(|d| &d.items) {
                if let Some(weight) = item.prescription.target_weight_kg {
                    assert_eq!(
                        (weight / 2.5).fract(),
                        0.0,
                        "{} target {weight} is not a 2.5 multiple",
                        item.name
                    );
                }
            }
        }
    }

    #[test]
    fn days_per_week_is_clamped_and_truncated() {
        let out = build("demo_user", &request(10, GoalKind::Fitness, false));
        assert_eq!(out.plan.meta.days_per_week, 7);
        assert_eq!(out.plan.days.len(), 4);

        let out = build("demo_user", &request(-3, GoalKind::Fitness, false));
        assert_eq!(out.plan.meta.days_per_week, 1);
        assert_eq!(out.plan.days.len(), 1);
        assert_eq!(out.plan.days[0].day_name, "Upper A");
    }

    #[test]
    fn missing_rm_falls_back_to_effort_rating() {
        let out = build("user_123", &request(4, GoalKind::Strength, false));
        for item in out.plan.days.iter().flat_map(|d| &d.items) {
            if item.kind == ItemKind::Main {
                assert_eq!(item.prescription.target_weight_kg, None);
                assert_eq!(item.prescription.intensity, Intensity::Rpe { value: 7.5 });
            }
        }
        assert!(out.summary_text.contains("RPE-based"));
    }

    #[test]
    fn strength_goal_raises_intensity_and_lowers_reps() {
        let strength = build("demo_user", &request(4, GoalKind::Strength, false));
        let hypertrophy = build("demo_user", &request(4, GoalKind::Hypertrophy, false));

        let bench = |out: &ProgramOutput| out.plan.days[0].items[0].prescription.clone();
        let s = bench(&strength);
        let h = bench(&hypertrophy);
        assert_eq!(s.intensity, Intensity::Percent1Rm { value: 0.82 });
        assert_eq!(h.intensity, Intensity::Percent1Rm { value: 0.75 });
        assert_eq!(s.reps, RepScheme::Count(3));
        assert_eq!(h.reps, RepScheme::Count(6));
    }

    #[test]
    fn program_id_comes_from_the_injected_source() {
        let out = build("demo_user", &request(4, GoalKind::Strength, false));
        assert_eq!(out.plan.program_id, "prog_20260126_0000");
    }
}
