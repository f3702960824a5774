//! Permission gating for controller actions.

pub mod checks;
pub mod gate;
