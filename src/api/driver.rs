// src/api/driver.rs

use crate::engine::{AudioDriver, Settings, Synth};

use super::{Module, created, delete, push};

pub(super) fn register(m: &Module) -> mlua::Result<()> {
    // The driver renders from the synth with the settings it was opened
    // with, so it keeps both alive.
    m.def("new_fluid_audio_driver", |lua, ctx, args| {
        let settings = args.capsule::<Settings>(1)?;
        let synth = args.capsule::<Synth>(2)?;
        let driver =
            unsafe { (ctx.api.new_fluid_audio_driver)(settings.as_ptr(), synth.as_ptr()) };
        push(lua, created(ctx, driver, &[&settings, &synth]))
    })?;

    m.def("delete_fluid_audio_driver", |_, _, args| delete::<AudioDriver>(args))?;

    Ok(())
}
