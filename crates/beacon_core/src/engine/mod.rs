/// Event-ordering and dispatch engine - broken down into its parts
mod action;
mod core;
mod fanout;
mod setup;
mod worker;

pub use action::{ActionKind, Completion};
pub use core::{Engine, EngineHandle, SetupParams};

#[cfg(test)]
pub(crate) use action::Action;
#[cfg(test)]
pub(crate) use core::EngineShared;
