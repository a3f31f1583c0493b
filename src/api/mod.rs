// src/api/mod.rs
//
// The Lua module table.
//
// Each submodule registers one object group. Every function follows the
// same path: check all arguments, call the engine once, translate the
// result, wrap new objects.

mod driver;
mod event;
mod player;
mod sequencer;
mod settings;
mod synth;
mod util;

use std::ffi::c_int;
use std::rc::Rc;

use mlua::{AnyUserData, IntoLuaMulti, Lua, MultiValue, Table};

use crate::context::Context;
use crate::engine::{
    FLUID_FAILED, FLUID_INT_TYPE, FLUID_NO_TYPE, FLUID_NUM_TYPE, FLUID_OK, FLUID_PLAYER_DONE,
    FLUID_PLAYER_PLAYING, FLUID_PLAYER_READY, FLUID_PLAYER_STOPPING, FLUID_SET_TYPE,
    FLUID_STR_TYPE,
};
use crate::event::EventType;
use crate::handle::{Capsule, Handle, NativeObject, Ownership};
use crate::marshal::Args;
use crate::translate;

/// Named registry slot holding the module table, for handle method lookup.
pub(crate) const MODULE_REGISTRY_KEY: &str = "cfluidsynth.module";

pub(crate) struct Module<'lua> {
    lua: &'lua Lua,
    table: Table,
    ctx: Rc<Context>,
}

impl Module<'_> {
    /// Define `name` as a module function.
    fn def<F, R>(&self, name: &'static str, f: F) -> mlua::Result<()>
    where
        F: Fn(&Lua, &Rc<Context>, &Args) -> mlua::Result<R> + 'static,
        R: IntoLuaMulti,
    {
        let ctx = Rc::clone(&self.ctx);
        let function = self.lua.create_function(move |lua, values: MultiValue| {
            let args = Args::new(name, values);
            f(lua, &ctx, &args)
        })?;
        self.table.set(name, function)
    }
}

/// Build the module table and remember it for method lookup.
pub(crate) fn install(lua: &Lua, ctx: Rc<Context>) -> mlua::Result<Table> {
    let module = Module {
        lua,
        table: lua.create_table()?,
        ctx,
    };

    settings::register(&module)?;
    synth::register(&module)?;
    driver::register(&module)?;
    player::register(&module)?;
    sequencer::register(&module)?;
    event::register(&module)?;
    util::register(&module)?;
    constants(&module)?;

    lua.set_named_registry_value(MODULE_REGISTRY_KEY, module.table.clone())?;
    Ok(module.table)
}

fn constants(m: &Module) -> mlua::Result<()> {
    m.table.set("FLUID_OK", FLUID_OK)?;
    m.table.set("FLUID_FAILED", FLUID_FAILED)?;

    let event_type = m.lua.create_table()?;
    for kind in EventType::ALL {
        event_type.set(kind.name(), kind.raw())?;
    }
    m.table.set("event_type", event_type)?;

    let player_status = m.lua.create_table()?;
    player_status.set("READY", FLUID_PLAYER_READY)?;
    player_status.set("PLAYING", FLUID_PLAYER_PLAYING)?;
    player_status.set("STOPPING", FLUID_PLAYER_STOPPING)?;
    player_status.set("DONE", FLUID_PLAYER_DONE)?;
    m.table.set("player_status", player_status)?;

    let settings_type = m.lua.create_table()?;
    settings_type.set("NO_TYPE", FLUID_NO_TYPE)?;
    settings_type.set("NUM_TYPE", FLUID_NUM_TYPE)?;
    settings_type.set("INT_TYPE", FLUID_INT_TYPE)?;
    settings_type.set("STR_TYPE", FLUID_STR_TYPE)?;
    settings_type.set("SET_TYPE", FLUID_SET_TYPE)?;
    m.table.set("settings_type", settings_type)
}

// ═══════════════════════════════════════════════════════════════════════════
// Shared Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Status result as seen from Lua: FLUID_OK or nil.
fn ok(code: c_int) -> Option<c_int> {
    translate::status(code).map(|()| FLUID_OK)
}

/// Owned capsule for a freshly created object that must not outlive
/// `parents`. Null becomes `None`.
fn created<T: NativeObject>(
    ctx: &Rc<Context>,
    ptr: *mut T,
    parents: &[&Rc<Capsule>],
) -> Option<Rc<Capsule>> {
    let capsule = ctx.capsule(translate::object(ptr)?, Ownership::Owned);
    for parent in parents {
        capsule.depend_on(parent);
    }
    Some(capsule)
}

fn push(lua: &Lua, capsule: Option<Rc<Capsule>>) -> mlua::Result<Option<AnyUserData>> {
    capsule.map(|c| lua.create_userdata(Handle(c))).transpose()
}

/// `delete_fluid_*`: only for live handles the binding owns.
fn delete<T: NativeObject>(args: &Args) -> mlua::Result<()> {
    args.owned::<T>(1)?.destroy();
    Ok(())
}
