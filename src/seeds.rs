//! Seed data: a built-in demo tenant with a small question bank, so the
//! service is usable without any external config.

use uuid::Uuid;

use crate::domain::{Difficulty, Question};

pub const DEMO_GROUP: &str = "DEMO";

/// (section, difficulty, topic, title)
const DEMO_BANK: &[(&str, Difficulty, &str, &str)] = &[
  ("MCQ", Difficulty::Easy, "arithmetic", "What is 7 x 8?"),
  ("MCQ", Difficulty::Easy, "arithmetic", "Which of these numbers is prime: 9, 11, 15, 21?"),
  ("MCQ", Difficulty::Easy, "fractions", "Which fraction equals 0.5?"),
  ("MCQ", Difficulty::Easy, "geometry", "How many sides does a hexagon have?"),
  ("MCQ", Difficulty::Easy, "geometry", "What is the sum of angles in a triangle?"),
  ("MCQ", Difficulty::Easy, "algebra", "If x + 3 = 10, what is x?"),
  ("MCQ", Difficulty::Medium, "algebra", "Solve 3x - 5 = 2x + 4."),
  ("MCQ", Difficulty::Medium, "geometry", "What is the area of a circle with radius 3?"),
  ("MCQ", Difficulty::Medium, "percentages", "A price of 80 rises by 15%. What is the new price?"),
  ("MCQ", Difficulty::Medium, "ratios", "Split 90 in the ratio 2:3."),
  ("MCQ", Difficulty::Medium, "exponents", "Simplify 2^3 x 2^4."),
  ("MCQ", Difficulty::Medium, "statistics", "Find the median of 3, 9, 4, 7, 5."),
  ("MCQ", Difficulty::Hard, "algebra", "Factorise x^2 - 5x + 6."),
  ("MCQ", Difficulty::Hard, "geometry", "Find the hypotenuse of a right triangle with legs 9 and 12."),
  ("MCQ", Difficulty::Hard, "probability", "Two dice are rolled. What is the probability the sum is 7?"),
  ("MCQ", Difficulty::Hard, "sequences", "Find the 20th term of 5, 8, 11, ..."),
  ("Short", Difficulty::Easy, "geometry", "Define a parallelogram."),
  ("Short", Difficulty::Medium, "algebra", "Explain why (a + b)^2 is not a^2 + b^2."),
  ("Short", Difficulty::Hard, "number theory", "Show that the sum of two odd numbers is even."),
  ("Essay", Difficulty::Medium, "statistics", "Describe how you would collect and present data on travel to school."),
  ("Essay", Difficulty::Medium, "geometry", "Explain, with a diagram, how to construct a perpendicular bisector."),
  ("Essay", Difficulty::Hard, "algebra", "Model a phone plan with a linear equation and compare two plans."),
];

/// Demo bank for Math, standard 8, in the `DEMO` group.
pub fn seed_questions() -> Vec<Question> {
  DEMO_BANK
    .iter()
    .map(|&(section, difficulty, topic, title)| Question {
      ques_id: Uuid::new_v4(),
      group_code: DEMO_GROUP.into(),
      subject: "Math".into(),
      standard: "8".into(),
      section: section.into(),
      difficulty,
      title: title.into(),
      topic: topic.into(),
    })
    .collect()
}
