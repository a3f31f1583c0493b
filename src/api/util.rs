// src/api/util.rs

use log::info;

use crate::config;
use crate::error::BindingError;
use crate::translate;

use super::Module;

pub(super) fn register(m: &Module) -> mlua::Result<()> {
    m.def("fluid_is_soundfont", |_, ctx, args| {
        let filename = args.string(1)?;
        Ok(translate::flag(unsafe { (ctx.api.fluid_is_soundfont)(filename.as_ptr()) }))
    })?;

    m.def("fluid_is_midifile", |_, ctx, args| {
        let filename = args.string(1)?;
        Ok(translate::flag(unsafe { (ctx.api.fluid_is_midifile)(filename.as_ptr()) }))
    })?;

    // Runs callbacks queued by the engine's timer thread.
    m.def("dispatch", |lua, ctx, _| ctx.pump(lua))?;

    m.def("init_logger", |_, _, args| {
        let name = args.string(1)?;
        let name = name.to_string_lossy();
        let Some(level) = config::parse_level(&name) else {
            return Err(BindingError::ArgumentType {
                function: args.function(),
                index: 1,
                expected: "log level name".into(),
                found: format!("'{}'", name),
            }
            .into());
        };
        let installed = crate::init_logger(level);
        if installed {
            info!("logger installed at {}", level);
        }
        Ok(installed)
    })?;

    Ok(())
}
