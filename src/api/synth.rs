// src/api/synth.rs
//
// Synth and SoundFont functions.
//
// Loaded fonts belong to the synth: `fluid_synth_get_sfont_by_id` hands out
// borrowed handles. `fluid_synth_remove_sfont` gives a font back to the host
// and `fluid_synth_add_sfont` takes one over.

use log::debug;

use crate::engine::{Settings, SoundFont, Synth};
use crate::handle::{HandleState, Ownership};
use crate::translate;

use super::{Module, created, delete, ok, push};

pub(super) fn register(m: &Module) -> mlua::Result<()> {
    m.def("new_fluid_synth", |lua, ctx, args| {
        let settings = args.capsule::<Settings>(1)?;
        let synth = unsafe { (ctx.api.new_fluid_synth)(settings.as_ptr()) };
        push(lua, created(ctx, synth, &[&settings]))
    })?;

    m.def("delete_fluid_synth", |_, _, args| delete::<Synth>(args))?;

    m.def("fluid_synth_sfload", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let filename = args.string(2)?;
        let reset = args.boolean(3)?;
        let id = unsafe { (ctx.api.fluid_synth_sfload)(synth, filename.as_ptr(), reset as _) };
        Ok(translate::id(id))
    })?;

    m.def("fluid_synth_sfunload", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let id = args.int(2)?;
        let reset = args.boolean(3)?;

        // Host handles to the font die with it.
        let font = translate::object(unsafe { (ctx.api.fluid_synth_get_sfont_by_id)(synth, id) })
            .and_then(|ptr| ctx.handles.lookup(ptr.as_ptr() as usize));
        let status = ok(unsafe { (ctx.api.fluid_synth_sfunload)(synth, id, reset as _) });
        if let (Some(_), Some(font)) = (status, font) {
            if font.ownership() == Ownership::Borrowed {
                ctx.handles.invalidate(&font, HandleState::Destroyed);
                font.sever();
                debug!("soundfont {} unloaded, handle invalidated", id);
            }
        }
        Ok(status)
    })?;

    m.def("fluid_synth_sfcount", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        Ok(unsafe { (ctx.api.fluid_synth_sfcount)(synth) })
    })?;

    m.def("fluid_synth_get_sfont_by_id", |lua, ctx, args| {
        let synth = args.capsule::<Synth>(1)?;
        let id = args.int(2)?;
        let sfont = unsafe { (ctx.api.fluid_synth_get_sfont_by_id)(synth.as_ptr(), id) };
        let capsule = translate::object(sfont).map(|ptr| {
            let capsule = ctx.capsule(ptr, Ownership::Borrowed);
            capsule.depend_on(&synth);
            capsule
        });
        push(lua, capsule)
    })?;

    m.def("fluid_synth_add_sfont", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let sfont = args.owned::<SoundFont>(2)?;
        let id = translate::id(unsafe { (ctx.api.fluid_synth_add_sfont)(synth, sfont.as_ptr()) });
        if id.is_some() {
            sfont.transfer();
        }
        Ok(id)
    })?;

    m.def("fluid_synth_remove_sfont", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let sfont = args.capsule::<SoundFont>(2)?;
        let status = ok(unsafe { (ctx.api.fluid_synth_remove_sfont)(synth, sfont.as_ptr()) });
        if status.is_some() {
            sfont.adopt();
        }
        Ok(status)
    })?;

    m.def("fluid_synth_noteon", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let (chan, key, vel) = (args.int(2)?, args.int(3)?, args.int(4)?);
        Ok(ok(unsafe { (ctx.api.fluid_synth_noteon)(synth, chan, key, vel) }))
    })?;

    m.def("fluid_synth_noteoff", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let (chan, key) = (args.int(2)?, args.int(3)?);
        Ok(ok(unsafe { (ctx.api.fluid_synth_noteoff)(synth, chan, key) }))
    })?;

    m.def("fluid_synth_cc", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let (chan, num, val) = (args.int(2)?, args.int(3)?, args.int(4)?);
        Ok(ok(unsafe { (ctx.api.fluid_synth_cc)(synth, chan, num, val) }))
    })?;

    m.def("fluid_synth_program_change", |_, ctx, args| {
        let synth = args.handle::<Synth>(1)?;
        let (chan, program) = (args.int(2)?, args.int(3)?);
        Ok(ok(unsafe { (ctx.api.fluid_synth_program_change)(synth, chan, program) }))
    })?;

    // ── SoundFont ──────────────────────────────────────────────────────────

    m.def("fluid_sfont_get_id", |_, ctx, args| {
        let sfont = args.handle::<SoundFont>(1)?;
        Ok(unsafe { (ctx.api.fluid_sfont_get_id)(sfont) })
    })?;

    m.def("fluid_sfont_get_name", |_, ctx, args| {
        let sfont = args.handle::<SoundFont>(1)?;
        Ok(unsafe { translate::string((ctx.api.fluid_sfont_get_name)(sfont)) })
    })?;

    m.def("delete_fluid_sfont", |_, _, args| delete::<SoundFont>(args))?;

    Ok(())
}
