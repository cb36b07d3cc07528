pub mod chat;
pub mod job;
pub mod prediction;
