pub mod dispatch;
pub mod gemini;
pub mod generation;
pub mod ngl;
pub mod quota;
pub mod scheduler;
