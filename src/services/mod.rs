pub mod citation;
pub mod copilot;
pub mod email;
pub mod file_store;
pub mod metadata;
