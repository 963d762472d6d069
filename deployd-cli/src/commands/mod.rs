pub mod admin;
pub mod client;
pub mod daemon;
pub mod deploy;
pub mod files;
pub mod service;
