pub mod cache;
pub mod cooldown;
pub mod fingerprint;
pub mod handlers;
pub mod history;
pub mod models;
pub mod prompts;
pub mod service;
