pub mod engine;
pub mod intake;
pub mod queue;
pub mod store;
pub mod translator;
pub mod worker;
pub mod workspace;
