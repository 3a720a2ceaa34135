pub mod health;
pub mod jobs;
pub mod tools;
pub mod ws;
