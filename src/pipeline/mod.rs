pub mod checks;
pub mod orchestrator;
