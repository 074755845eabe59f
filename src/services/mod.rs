pub mod auth;
pub mod gemini;
pub mod generation;
pub mod goal_store;
pub mod tutor;
