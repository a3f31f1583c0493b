// src/context.rs
//
// Per-interpreter binding state.

use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, info};
use mlua::{AnyUserData, Lua};

use crate::bridge::CallbackBridge;
use crate::engine::EngineApi;
use crate::handle::{Capsule, Handle, HandleRegistry, NativeObject, Ownership};

/// Everything one opened module shares: the engine table, the handle index
/// and the callback bridge. Capsules hold it, so it lives as long as the
/// last handle.
pub struct Context {
    pub(crate) api: Arc<EngineApi>,
    pub(crate) handles: HandleRegistry,
    pub(crate) callbacks: CallbackBridge,
}

impl Context {
    pub fn new(api: EngineApi) -> Rc<Self> {
        let api = Arc::new(api);
        info!("binding context opened ({:?})", api);
        Rc::new(Self {
            callbacks: CallbackBridge::new(Arc::clone(&api)),
            handles: HandleRegistry::default(),
            api,
        })
    }

    /// Capsule for a native pointer, shared with any live one at the same address.
    pub(crate) fn capsule<T: NativeObject>(
        self: &Rc<Self>,
        ptr: NonNull<T>,
        ownership: Ownership,
    ) -> Rc<Capsule> {
        self.handles.wrap(self, T::KIND, ptr.cast(), ownership)
    }

    pub(crate) fn wrap<T: NativeObject>(
        self: &Rc<Self>,
        lua: &Lua,
        ptr: NonNull<T>,
        ownership: Ownership,
    ) -> mlua::Result<AnyUserData> {
        lua.create_userdata(Handle(self.capsule(ptr, ownership)))
    }

    /// Deliver queued sequencer callbacks. Returns how many ran.
    pub(crate) fn pump(self: &Rc<Self>, lua: &Lua) -> mlua::Result<usize> {
        self.callbacks.dispatch(lua, self)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        debug!(
            "binding context closed ({} registrations outstanding)",
            self.callbacks.registration_count()
        );
    }
}
