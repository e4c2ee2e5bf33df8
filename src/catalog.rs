//! Built-in exercise catalog and lookup helpers.

use crate::db::schema::Exercise;

/// Muscle groups offered when creating a custom exercise or filtering progress.
pub const MUSCLE_GROUPS: &[&str] = &[
    "Chest",
    "Back",
    "Legs",
    "Shoulders",
    "Biceps",
    "Triceps",
    "Core",
];

const DEFAULT_EXERCISES: &[(&str, &str, &str)] = &[
    ("bench-press", "Bench Press", "Chest"),
    ("incline-bench-press", "Incline Bench Press", "Chest"),
    ("dumbbell-press", "Dumbbell Press", "Chest"),
    ("push-ups", "Push-ups", "Chest"),
    ("dips", "Dips", "Chest"),
    ("deadlift", "Deadlift", "Back"),
    ("pull-ups", "Pull-ups", "Back"),
    ("barbell-rows", "Barbell Rows", "Back"),
    ("lat-pulldown", "Lat Pulldown", "Back"),
    ("cable-rows", "Cable Rows", "Back"),
    ("squat", "Squat", "Legs"),
    ("leg-press", "Leg Press", "Legs"),
    ("lunges", "Lunges", "Legs"),
    ("leg-curls", "Leg Curls", "Legs"),
    ("calf-raises", "Calf Raises", "Legs"),
    ("overhead-press", "Overhead Press", "Shoulders"),
    ("lateral-raises", "Lateral Raises", "Shoulders"),
    ("front-raises", "Front Raises", "Shoulders"),
    ("rear-delt-flys", "Rear Delt Flys", "Shoulders"),
    ("bicep-curls", "Bicep Curls", "Arms"),
    ("tricep-extensions", "Tricep Extensions", "Arms"),
    ("hammer-curls", "Hammer Curls", "Arms"),
    ("close-grip-bench", "Close Grip Bench Press", "Arms"),
];

pub fn default_exercises() -> Vec<Exercise> {
    DEFAULT_EXERCISES
        .iter()
        .map(|(id, name, muscle_group)| Exercise {
            id: id.to_string(),
            name: name.to_string(),
            muscle_group: muscle_group.to_string(),
            is_default: true,
            is_custom: false,
        })
        .collect()
}

/// Case-insensitive name search, optionally narrowed to one muscle group.
/// `None`, an empty group or `"all"` match every group.
pub fn search_exercises<'a>(
    exercises: &'a [Exercise],
    term: &str,
    muscle_group: Option<&str>,
) -> Vec<&'a Exercise> {
    let term = term.trim().to_lowercase();
    let group = muscle_group.filter(|g| !g.is_empty() && *g != "all");

    exercises
        .iter()
        .filter(|e| e.name.to_lowercase().contains(&term))
        .filter(|e| group.is_none_or(|g| e.muscle_group == g))
        .collect()
}
