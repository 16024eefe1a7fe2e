//! Seed data and small utilities related to default content.

use uuid::Uuid;

use crate::domain::{Exercise, ExerciseSource};

/// Minimal set of built-in exercises that guarantee the app is useful even
/// without external config or the remote challenge service.
pub fn seed_exercises() -> Vec<Exercise> {
    vec![
        Exercise {
            id: "ex101".into(),
            concept: "for loop".into(),
            task: "Arrange the lines so the program prints the numbers 0 through 4, one per line.".into(),
            source: ExerciseSource::Seed,
            reference: vec![
                "def print_numbers():".into(),
                "    for i in range(5):".into(),
                "        print(i)".into(),
                "print_numbers()".into(),
            ],
            delivered: vec![],
        },
        Exercise {
            id: "ex102".into(),
            concept: "functions".into(),
            task: "Arrange the lines so the program doubles 21 and prints the result.".into(),
            source: ExerciseSource::Seed,
            reference: vec![
                "def double(n):".into(),
                "    return n * 2".into(),
                "result = double(21)".into(),
                "print(result)".into(),
            ],
            delivered: vec![],
        },
        Exercise {
            id: "ex103".into(),
            concept: "conditionals".into(),
            task: "Arrange the lines so the program reports whether 7 is even or odd.".into(),
            source: ExerciseSource::Seed,
            reference: vec![
                "n = 7".into(),
                "if n % 2 == 0:".into(),
                "    print('even')".into(),
                "else:".into(),
                "    print('odd')".into(),
            ],
            delivered: vec![],
        },
    ]
}

/// Absolute last-resort fallback: if all stores are empty, we inject this.
pub fn hard_fallback_exercise(concept: String) -> Exercise {
    Exercise {
        id: Uuid::new_v4().to_string(),
        concept,
        task: "Arrange the lines so the program prints a greeting.".into(),
        source: ExerciseSource::Seed,
        reference: vec![
            "def main():".into(),
            "    print('hello, world')".into(),
            "main()".into(),
        ],
        delivered: vec![],
    }
}
