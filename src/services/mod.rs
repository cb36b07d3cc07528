pub mod dispatcher;
pub mod filters;
pub mod janitor;
pub mod queue;
pub mod result_handler;
pub mod storage;
pub mod store;
pub mod submitter;
pub mod telegram;
pub mod trivia;
