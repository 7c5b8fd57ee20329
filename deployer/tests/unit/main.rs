//! Integration tests for the image deployer

mod test_conflict;
mod test_fsm;
mod test_orchestrator;
