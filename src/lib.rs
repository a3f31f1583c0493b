// src/lib.rs
//
// Lua bindings for the FluidSynth engine.
//
// Embedders open the module into their own interpreter with `open*`; with
// the `module` feature the crate also builds as `require("cfluidsynth")`.

mod api;
mod bridge;
mod config;
mod context;
mod engine;
mod error;
mod event;
mod handle;
mod lifetime;
mod marshal;
mod translate;


// Re-export key types for Rust consumers
pub use config::{BridgeConfig, LIBRARY_ENV, LOG_ENV};
pub use engine::EngineApi;
pub use error::BindingError;
pub use event::EventType;
pub use handle::{Handle, HandleKind, HandleState, Ownership};

use log::LevelFilter;
use mlua::{Lua, Table};

use crate::context::Context;

/// Open the module with configuration taken from the environment.
pub fn open(lua: &Lua) -> mlua::Result<Table> {
    open_with_config(lua, BridgeConfig::from_env())
}

/// Open the module, loading the engine library named by `config`.
pub fn open_with_config(lua: &Lua, config: BridgeConfig) -> mlua::Result<Table> {
    if let Some(level) = config.log_level {
        init_logger(level);
    }
    let api = EngineApi::load(&config)?;
    open_with_engine(lua, api)
}

/// Open the module over an already resolved function table.
pub fn open_with_engine(lua: &Lua, api: EngineApi) -> mlua::Result<Table> {
    api::install(lua, Context::new(api))
}

/// Install a `colog` logger at `level`. Returns false if the process
/// already has a logger.
pub fn init_logger(level: LevelFilter) -> bool {
    colog::default_builder().filter_level(level).try_init().is_ok()
}

#[cfg(feature = "module")]
#[mlua::lua_module]
fn cfluidsynth(lua: &Lua) -> mlua::Result<Table> {
    open(lua)
}
