//! Turn-loop orchestration: the Supervisor's priority function, the
//! cooperative turn loop, and the eight agent nodes it dispatches to.

pub mod chat;
pub mod nodes;
#[cfg(test)]
mod scenarios;
pub mod supervisor;
pub mod support;
pub mod turn_loop;
pub mod turn_node;

pub use chat::{ChatResponse, VeritasCore};
pub use supervisor::{decide, Decision, NextAgent};
pub use turn_loop::TurnLoop;
pub use turn_node::TurnNode;
