//! Deployment pipeline

pub mod conflict;
pub mod fsm;
pub mod orchestrator;
pub mod poller;
pub mod report;
