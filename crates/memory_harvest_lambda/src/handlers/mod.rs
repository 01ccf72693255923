pub mod dispatcher;
pub mod enumerator;
pub mod orchestrator;
pub mod worker;
