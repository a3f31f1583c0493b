// src/api/settings.rs

use std::ffi::{CStr, c_char, c_int};

use crate::engine::{FLUID_NO_TYPE, Settings};
use crate::translate;

use super::{Module, created, delete, ok, push};

/// Longest string setting value returned by `fluid_settings_getstr`.
const STR_CAPACITY: usize = 1024;

pub(super) fn register(m: &Module) -> mlua::Result<()> {
    m.def("new_fluid_settings", |lua, ctx, _| {
        let settings = unsafe { (ctx.api.new_fluid_settings)() };
        push(lua, created(ctx, settings, &[]))
    })?;

    m.def("delete_fluid_settings", |_, _, args| delete::<Settings>(args))?;

    m.def("fluid_settings_get_type", |_, ctx, args| {
        let settings = args.handle::<Settings>(1)?;
        let name = args.string(2)?;
        let kind = unsafe { (ctx.api.fluid_settings_get_type)(settings, name.as_ptr()) };
        Ok(translate::enumerated(kind, FLUID_NO_TYPE))
    })?;

    m.def("fluid_settings_setstr", |_, ctx, args| {
        let settings = args.handle::<Settings>(1)?;
        let name = args.string(2)?;
        let value = args.string(3)?;
        Ok(ok(unsafe {
            (ctx.api.fluid_settings_setstr)(settings, name.as_ptr(), value.as_ptr())
        }))
    })?;

    m.def("fluid_settings_getstr", |_, ctx, args| {
        let settings = args.handle::<Settings>(1)?;
        let name = args.string(2)?;
        let mut buf = vec![0 as c_char; STR_CAPACITY];
        let code = unsafe {
            (ctx.api.fluid_settings_copystr)(
                settings,
                name.as_ptr(),
                buf.as_mut_ptr(),
                STR_CAPACITY as c_int,
            )
        };
        Ok(translate::status(code).map(|()| {
            // copystr always terminates within the buffer
            let value = unsafe { CStr::from_ptr(buf.as_ptr()) };
            value.to_string_lossy().into_owned()
        }))
    })?;

    m.def("fluid_settings_setnum", |_, ctx, args| {
        let settings = args.handle::<Settings>(1)?;
        let name = args.string(2)?;
        let value = args.number(3)?;
        Ok(ok(unsafe {
            (ctx.api.fluid_settings_setnum)(settings, name.as_ptr(), value)
        }))
    })?;

    m.def("fluid_settings_getnum", |_, ctx, args| {
        let settings = args.handle::<Settings>(1)?;
        let name = args.string(2)?;
        let mut value = 0.0;
        let code = unsafe { (ctx.api.fluid_settings_getnum)(settings, name.as_ptr(), &mut value) };
        Ok(translate::out_param(code, value))
    })?;

    m.def("fluid_settings_setint", |_, ctx, args| {
        let settings = args.handle::<Settings>(1)?;
        let name = args.string(2)?;
        let value = args.int(3)?;
        Ok(ok(unsafe {
            (ctx.api.fluid_settings_setint)(settings, name.as_ptr(), value)
        }))
    })?;

    m.def("fluid_settings_getint", |_, ctx, args| {
        let settings = args.handle::<Settings>(1)?;
        let name = args.string(2)?;
        let mut value: c_int = 0;
        let code = unsafe { (ctx.api.fluid_settings_getint)(settings, name.as_ptr(), &mut value) };
        // negative integer settings are values, not failures
        Ok(translate::out_param(code, translate::signed(value)))
    })?;

    Ok(())
}
