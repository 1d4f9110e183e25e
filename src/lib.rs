//! The `amem` command-line front end over `agent_mem_core`.

pub mod commands;
pub mod render;
