// src/api/sequencer.rs
//
// Sequencer functions.
//
// Every function checks all of its arguments first, so a rejected call runs
// nothing. It then drains the callback queue (deliveries from the system
// timer thread), checks its handles again since a callback may have deleted
// one, calls the engine, and drains once more (deliveries the call itself
// produced).

use std::rc::Rc;

use mlua::Lua;

use crate::context::Context;
use crate::engine::{Event, Sequencer, Synth};
use crate::translate;

use super::{Module, created, ok, push};

fn pumped<R>(lua: &Lua, ctx: &Rc<Context>, f: impl FnOnce() -> mlua::Result<R>) -> mlua::Result<R> {
    ctx.pump(lua)?;
    let result = f()?;
    ctx.pump(lua)?;
    Ok(result)
}

pub(super) fn register(m: &Module) -> mlua::Result<()> {
    m.def("new_fluid_sequencer", |lua, ctx, _| {
        let seq = unsafe { (ctx.api.new_fluid_sequencer2)(1) };
        push(lua, created(ctx, seq, &[]))
    })?;

    m.def("new_fluid_sequencer2", |lua, ctx, args| {
        let use_system_timer = args.boolean(1)?;
        let seq = unsafe { (ctx.api.new_fluid_sequencer2)(use_system_timer as _) };
        push(lua, created(ctx, seq, &[]))
    })?;

    m.def("delete_fluid_sequencer", |lua, ctx, args| {
        let seq = args.owned::<Sequencer>(1)?;
        pumped(lua, ctx, || {
            args.still_live::<Sequencer>(1, &seq)?;
            seq.destroy();
            Ok(())
        })
    })?;

    m.def("fluid_sequencer_get_use_system_timer", |_, ctx, args| {
        let seq = args.handle::<Sequencer>(1)?;
        Ok(translate::flag(unsafe {
            (ctx.api.fluid_sequencer_get_use_system_timer)(seq)
        }))
    })?;

    // ── Clients ────────────────────────────────────────────────────────────

    m.def("fluid_sequencer_register_client", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let name = args.string(2)?;
        let callback = args.function_arg(3)?;
        let data = args.value(4);
        pumped(lua, ctx, || {
            args.still_live::<Sequencer>(1, &seq)?;
            ctx.callbacks.register(lua, &seq, &name, callback, data)
        })
    })?;

    m.def("fluid_sequencer_unregister_client", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let client = args.short(2)?;
        pumped(lua, ctx, || {
            args.still_live::<Sequencer>(1, &seq)?;
            ctx.callbacks.unregister(lua, ctx, &seq, client)
        })
    })?;

    m.def("fluid_sequencer_count_clients", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            Ok(unsafe { (ctx.api.fluid_sequencer_count_clients)(seq) })
        })
    })?;

    m.def("fluid_sequencer_get_client_id", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let index = args.int(2)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            Ok(translate::seq_id(unsafe {
                (ctx.api.fluid_sequencer_get_client_id)(seq, index)
            }))
        })
    })?;

    m.def("fluid_sequencer_get_client_name", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let client = args.short(2)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            Ok(unsafe {
                translate::string((ctx.api.fluid_sequencer_get_client_name)(seq, client))
            })
        })
    })?;

    m.def("fluid_sequencer_client_is_dest", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let client = args.short(2)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            Ok(translate::flag(unsafe {
                (ctx.api.fluid_sequencer_client_is_dest)(seq, client)
            }))
        })
    })?;

    // A synth registered as destination must outlive the sequencer.
    m.def("fluid_sequencer_register_fluidsynth", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let synth = args.capsule::<Synth>(2)?;
        pumped(lua, ctx, || {
            args.still_live::<Sequencer>(1, &seq)?;
            args.still_live::<Synth>(2, &synth)?;
            let id = translate::seq_id(unsafe {
                (ctx.api.fluid_sequencer_register_fluidsynth)(seq.as_ptr(), synth.as_ptr())
            });
            if id.is_some() {
                seq.depend_on(&synth);
            }
            Ok(id)
        })
    })?;

    // ── Scheduling ─────────────────────────────────────────────────────────

    m.def("fluid_sequencer_process", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let msec = args.uint(2)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            unsafe { (ctx.api.fluid_sequencer_process)(seq, msec) };
            Ok(())
        })
    })?;

    m.def("fluid_sequencer_send_now", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let evt = args.capsule::<Event>(2)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            let evt = args.still_live::<Event>(2, &evt)?;
            unsafe { (ctx.api.fluid_sequencer_send_now)(seq, evt) };
            Ok(())
        })
    })?;

    m.def("fluid_sequencer_send_at", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let evt = args.capsule::<Event>(2)?;
        let time = args.uint(3)?;
        let absolute = args.boolean(4)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            let evt = args.still_live::<Event>(2, &evt)?;
            Ok(ok(unsafe {
                (ctx.api.fluid_sequencer_send_at)(seq, evt, time, absolute as _)
            }))
        })
    })?;

    m.def("fluid_sequencer_remove_events", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let source = args.short(2)?;
        let dest = args.short(3)?;
        let kind = args.int(4)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            unsafe { (ctx.api.fluid_sequencer_remove_events)(seq, source, dest, kind) };
            Ok(())
        })
    })?;

    m.def("fluid_sequencer_get_tick", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            Ok(unsafe { (ctx.api.fluid_sequencer_get_tick)(seq) })
        })
    })?;

    m.def("fluid_sequencer_set_time_scale", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        let scale = args.number(2)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            unsafe { (ctx.api.fluid_sequencer_set_time_scale)(seq, scale) };
            Ok(())
        })
    })?;

    m.def("fluid_sequencer_get_time_scale", |lua, ctx, args| {
        let seq = args.capsule::<Sequencer>(1)?;
        pumped(lua, ctx, || {
            let seq = args.still_live::<Sequencer>(1, &seq)?;
            Ok(unsafe { (ctx.api.fluid_sequencer_get_time_scale)(seq) })
        })
    })?;

    Ok(())
}
