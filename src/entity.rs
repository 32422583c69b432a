pub mod appointments;
pub mod brands;
pub mod businesses;
pub mod conversations;
pub mod exercises;
pub mod instagram_mentions;
pub mod knowledge_base;
pub mod personal_records;
pub mod sets;
pub mod submissions;
pub mod workout_exercises;
pub mod workouts;
