//! Virtual machine execution and context management

mod class_registry;
mod context;
mod dispatch;
mod interpreter;
mod lifecycle;
mod tables;

pub use class_registry::ClassRegistry;
pub use context::{
    Mode, ResourceCounters, ResourceLimits, VmContext, VmContextId, VmOptions,
};
pub use dispatch::BlockOutcome;
pub use interpreter::Thread;
pub use lifecycle::Vm;
pub use tables::InstructionTables;
