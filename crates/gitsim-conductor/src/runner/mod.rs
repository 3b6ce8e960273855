pub mod delay;
pub(crate) mod effects;
pub mod event;
pub mod fault;
pub mod notify;
pub(crate) mod orchestrator;
