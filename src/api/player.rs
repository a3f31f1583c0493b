// src/api/player.rs

use crate::engine::{Player, Synth};
use crate::error::BindingError;

use super::{Module, created, delete, ok, push};

pub(super) fn register(m: &Module) -> mlua::Result<()> {
    m.def("new_fluid_player", |lua, ctx, args| {
        let synth = args.capsule::<Synth>(1)?;
        let player = unsafe { (ctx.api.new_fluid_player)(synth.as_ptr()) };
        push(lua, created(ctx, player, &[&synth]))
    })?;

    m.def("delete_fluid_player", |_, _, args| delete::<Player>(args))?;

    m.def("fluid_player_add", |_, ctx, args| {
        let player = args.handle::<Player>(1)?;
        let midifile = args.string(2)?;
        Ok(ok(unsafe { (ctx.api.fluid_player_add)(player, midifile.as_ptr()) }))
    })?;

    m.def("fluid_player_play", |_, ctx, args| {
        let player = args.handle::<Player>(1)?;
        Ok(ok(unsafe { (ctx.api.fluid_player_play)(player) }))
    })?;

    m.def("fluid_player_stop", |_, ctx, args| {
        let player = args.handle::<Player>(1)?;
        Ok(ok(unsafe { (ctx.api.fluid_player_stop)(player) }))
    })?;

    // Blocks until playback ends. From inside a sequencer callback that
    // could wait on the very thread being serviced.
    m.def("fluid_player_join", |_, ctx, args| {
        let player = args.handle::<Player>(1)?;
        if ctx.callbacks.is_dispatching() {
            return Err(BindingError::Reentrant {
                function: args.function(),
            }
            .into());
        }
        Ok(ok(unsafe { (ctx.api.fluid_player_join)(player) }))
    })?;

    m.def("fluid_player_get_status", |_, ctx, args| {
        let player = args.handle::<Player>(1)?;
        Ok(unsafe { (ctx.api.fluid_player_get_status)(player) })
    })?;

    m.def("fluid_player_set_loop", |_, ctx, args| {
        let player = args.handle::<Player>(1)?;
        let loop_count = args.int(2)?;
        Ok(ok(unsafe { (ctx.api.fluid_player_set_loop)(player, loop_count) }))
    })?;

    m.def("fluid_player_set_bpm", |_, ctx, args| {
        let player = args.handle::<Player>(1)?;
        let bpm = args.int(2)?;
        Ok(ok(unsafe { (ctx.api.fluid_player_set_bpm)(player, bpm) }))
    })?;

    Ok(())
}
