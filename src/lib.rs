pub mod agent;
pub mod capability;
pub mod checks;
pub mod config;
pub mod errors;
pub mod feature;
pub mod orchestrator;
pub mod result;
pub mod store;
pub mod ui;
