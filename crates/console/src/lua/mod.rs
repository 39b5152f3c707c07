//! Lua 5.4 binding for console sessions.

mod host_object;
mod runtime;

pub use runtime::{LuaFactory, LuaInterpreter, LuaLimits, INSTRUCTION_HOOK_INTERVAL};
