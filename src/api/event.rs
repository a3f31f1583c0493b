// src/api/event.rs
//
// Sequencer event functions. Mutators return nothing, accessors return the
// raw field: -1 in source, dest or type means "unset" and is passed through.

use std::ffi::c_void;

use crate::engine::Event;

use super::{Module, created, delete, push};

/// `fluid_event_*(evt, channel, value)` mutators.
macro_rules! channel_value_mutators {
    ($m:ident; $($name:ident),* $(,)?) => {
        $(
            $m.def(stringify!($name), |_, ctx, args| {
                let evt = args.handle::<Event>(1)?;
                let (channel, value) = (args.int(2)?, args.int(3)?);
                unsafe { (ctx.api.$name)(evt, channel, value) };
                Ok(())
            })?;
        )*
    };
}

macro_rules! channel_mutators {
    ($m:ident; $($name:ident),* $(,)?) => {
        $(
            $m.def(stringify!($name), |_, ctx, args| {
                let evt = args.handle::<Event>(1)?;
                let channel = args.int(2)?;
                unsafe { (ctx.api.$name)(evt, channel) };
                Ok(())
            })?;
        )*
    };
}

macro_rules! accessors {
    ($m:ident; $($name:ident),* $(,)?) => {
        $(
            $m.def(stringify!($name), |_, ctx, args| {
                let evt = args.handle::<Event>(1)?;
                Ok(unsafe { (ctx.api.$name)(evt) })
            })?;
        )*
    };
}

pub(super) fn register(m: &Module) -> mlua::Result<()> {
    m.def("new_fluid_event", |lua, ctx, _| {
        let evt = unsafe { (ctx.api.new_fluid_event)() };
        push(lua, created(ctx, evt, &[]))
    })?;

    m.def("delete_fluid_event", |_, _, args| delete::<Event>(args))?;

    m.def("fluid_event_set_source", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let source = args.short(2)?;
        unsafe { (ctx.api.fluid_event_set_source)(evt, source) };
        Ok(())
    })?;

    m.def("fluid_event_set_dest", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let dest = args.short(2)?;
        unsafe { (ctx.api.fluid_event_set_dest)(evt, dest) };
        Ok(())
    })?;

    // ── Mutators ───────────────────────────────────────────────────────────

    // The engine only carries the token; it is never dereferenced.
    m.def("fluid_event_timer", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let token = args.integer(2)?;
        unsafe { (ctx.api.fluid_event_timer)(evt, token as usize as *mut c_void) };
        Ok(())
    })?;

    m.def("fluid_event_note", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let channel = args.int(2)?;
        let (key, vel) = (args.short(3)?, args.short(4)?);
        let duration = args.uint(5)?;
        unsafe { (ctx.api.fluid_event_note)(evt, channel, key, vel, duration) };
        Ok(())
    })?;

    m.def("fluid_event_noteon", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let channel = args.int(2)?;
        let (key, vel) = (args.short(3)?, args.short(4)?);
        unsafe { (ctx.api.fluid_event_noteon)(evt, channel, key, vel) };
        Ok(())
    })?;

    m.def("fluid_event_noteoff", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let channel = args.int(2)?;
        let key = args.short(3)?;
        unsafe { (ctx.api.fluid_event_noteoff)(evt, channel, key) };
        Ok(())
    })?;

    m.def("fluid_event_bank_select", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let channel = args.int(2)?;
        let bank = args.short(3)?;
        unsafe { (ctx.api.fluid_event_bank_select)(evt, channel, bank) };
        Ok(())
    })?;

    m.def("fluid_event_program_change", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let (channel, preset) = (args.int(2)?, args.int(3)?);
        unsafe { (ctx.api.fluid_event_program_change)(evt, channel, preset) };
        Ok(())
    })?;

    m.def("fluid_event_program_select", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let channel = args.int(2)?;
        let sfont_id = args.uint(3)?;
        let (bank, preset) = (args.short(4)?, args.short(5)?);
        unsafe { (ctx.api.fluid_event_program_select)(evt, channel, sfont_id, bank, preset) };
        Ok(())
    })?;

    m.def("fluid_event_control_change", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let channel = args.int(2)?;
        let control = args.short(3)?;
        let value = args.int(4)?;
        unsafe { (ctx.api.fluid_event_control_change)(evt, channel, control, value) };
        Ok(())
    })?;

    m.def("fluid_event_key_pressure", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let channel = args.int(2)?;
        let key = args.short(3)?;
        let value = args.int(4)?;
        unsafe { (ctx.api.fluid_event_key_pressure)(evt, channel, key, value) };
        Ok(())
    })?;

    m.def("fluid_event_system_reset", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        unsafe { (ctx.api.fluid_event_system_reset)(evt) };
        Ok(())
    })?;

    m.def("fluid_event_unregistering", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        unsafe { (ctx.api.fluid_event_unregistering)(evt) };
        Ok(())
    })?;

    channel_mutators!(m;
        fluid_event_all_sounds_off,
        fluid_event_all_notes_off,
        fluid_event_any_control_change,
    );

    channel_value_mutators!(m;
        fluid_event_pitch_bend,
        fluid_event_pitch_wheelsens,
        fluid_event_modulation,
        fluid_event_sustain,
        fluid_event_pan,
        fluid_event_volume,
        fluid_event_reverb_send,
        fluid_event_chorus_send,
        fluid_event_channel_pressure,
    );

    // ── Accessors ──────────────────────────────────────────────────────────

    accessors!(m;
        fluid_event_get_type,
        fluid_event_get_source,
        fluid_event_get_dest,
        fluid_event_get_channel,
        fluid_event_get_key,
        fluid_event_get_velocity,
        fluid_event_get_control,
        fluid_event_get_value,
        fluid_event_get_program,
        fluid_event_get_duration,
        fluid_event_get_bank,
        fluid_event_get_pitch,
        fluid_event_get_sfont_id,
    );

    // Timer token set by `fluid_event_timer`, 0 for other events.
    m.def("fluid_event_get_data", |_, ctx, args| {
        let evt = args.handle::<Event>(1)?;
        let data = unsafe { (ctx.api.fluid_event_get_data)(evt) };
        Ok(data as usize as i64)
    })?;

    Ok(())
}
