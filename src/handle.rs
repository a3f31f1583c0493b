// src/handle.rs
//
// Native objects as Lua values.
//
// Every engine pointer the host can see lives in a `Capsule`: the pointer,
// its kind tag, whether it is still usable and who is responsible for
// freeing it. Lua holds capsules through `Handle` userdata, so capsule
// storage is reclaimed by Lua's GC like any other value. The registry only
// indexes live capsules by address and never keeps one alive.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use log::debug;
use mlua::{Lua, MetaMethod, Table, UserData, UserDataMethods, UserDataRef, Value};

use crate::api::MODULE_REGISTRY_KEY;
use crate::context::Context;

// ═══════════════════════════════════════════════════════════════════════════
// Kinds, States, Ownership
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Settings,
    Synth,
    SoundFont,
    AudioDriver,
    Player,
    Sequencer,
    Event,
}

impl HandleKind {
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Settings => "Settings",
            HandleKind::Synth => "Synth",
            HandleKind::SoundFont => "SoundFont",
            HandleKind::AudioDriver => "AudioDriver",
            HandleKind::Player => "Player",
            HandleKind::Sequencer => "Sequencer",
            HandleKind::Event => "Event",
        }
    }

    /// Prefix of the module functions taking this kind as first argument.
    fn method_prefix(self) -> &'static str {
        match self {
            HandleKind::Settings => "fluid_settings_",
            HandleKind::Synth => "fluid_synth_",
            HandleKind::SoundFont => "fluid_sfont_",
            HandleKind::AudioDriver => "fluid_audio_driver_",
            HandleKind::Player => "fluid_player_",
            HandleKind::Sequencer => "fluid_sequencer_",
            HandleKind::Event => "fluid_event_",
        }
    }

    fn destructor(self) -> &'static str {
        match self {
            HandleKind::Settings => "delete_fluid_settings",
            HandleKind::Synth => "delete_fluid_synth",
            HandleKind::SoundFont => "delete_fluid_sfont",
            HandleKind::AudioDriver => "delete_fluid_audio_driver",
            HandleKind::Player => "delete_fluid_player",
            HandleKind::Sequencer => "delete_fluid_sequencer",
            HandleKind::Event => "delete_fluid_event",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Implemented by the opaque engine types to tie them to a kind tag.
pub trait NativeObject {
    const KIND: HandleKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Live,
    /// Freed, explicitly or as a dependent of something freed.
    Destroyed,
    /// Handed over to another engine object, which now frees it.
    Transferred,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandleState::Live => "live",
            HandleState::Destroyed => "destroyed",
            HandleState::Transferred => "owned by the engine",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The binding frees the object (explicitly or on finalization).
    Owned,
    /// The engine owns the object; the binding never frees it.
    Borrowed,
}

// ═══════════════════════════════════════════════════════════════════════════
// Capsule
// ═══════════════════════════════════════════════════════════════════════════

/// Shared state of one exposed native pointer.
pub struct Capsule {
    pub(crate) kind: HandleKind,
    ptr: NonNull<c_void>,
    pub(crate) state: Cell<HandleState>,
    pub(crate) ownership: Cell<Ownership>,
    /// Objects that must outlive this one.
    pub(crate) parents: RefCell<Vec<Rc<Capsule>>>,
    /// Objects that depend on this one.
    pub(crate) dependents: RefCell<Vec<Weak<Capsule>>>,
    pub(crate) ctx: Rc<Context>,
}

impl Capsule {
    fn new(ctx: &Rc<Context>, kind: HandleKind, ptr: NonNull<c_void>, ownership: Ownership) -> Self {
        Self {
            kind,
            ptr,
            state: Cell::new(HandleState::Live),
            ownership: Cell::new(ownership),
            parents: RefCell::new(Vec::new()),
            dependents: RefCell::new(Vec::new()),
            ctx: Rc::clone(ctx),
        }
    }

    /// A capsule standing for an object that no longer exists.
    ///
    /// Used when the engine reports an object the host has already let go
    /// of; every use fails with UseAfterFree.
    pub(crate) fn tombstone(ctx: &Rc<Context>, kind: HandleKind, address: usize) -> Rc<Self> {
        let ptr = NonNull::new(address as *mut c_void).unwrap_or(NonNull::dangling());
        let capsule = Self::new(ctx, kind, ptr, Ownership::Borrowed);
        capsule.state.set(HandleState::Destroyed);
        Rc::new(capsule)
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn state(&self) -> HandleState {
        self.state.get()
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership.get()
    }

    pub fn is_live(&self) -> bool {
        self.state.get() == HandleState::Live
    }

    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// The native pointer, typed. Callers have already checked the kind.
    pub(crate) fn as_ptr<T: NativeObject>(&self) -> *mut T {
        debug_assert_eq!(T::KIND, self.kind);
        self.ptr.as_ptr().cast()
    }
}

impl fmt::Debug for Capsule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capsule")
            .field("kind", &self.kind)
            .field("address", &format_args!("{:#x}", self.address()))
            .field("state", &self.state.get())
            .field("ownership", &self.ownership.get())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════════

/// Address index of live capsules.
#[derive(Default)]
pub struct HandleRegistry {
    live: RefCell<HashMap<usize, Weak<Capsule>>>,
}

impl HandleRegistry {
    /// Wrap a native pointer.
    ///
    /// A pointer that already has a live capsule of the same kind gets that
    /// capsule back, so the host never holds two independent owners of one
    /// object.
    pub(crate) fn wrap(
        &self,
        ctx: &Rc<Context>,
        kind: HandleKind,
        ptr: NonNull<c_void>,
        ownership: Ownership,
    ) -> Rc<Capsule> {
        let address = ptr.as_ptr() as usize;
        if let Some(existing) = self.lookup(address) {
            if existing.kind == kind {
                return existing;
            }
        }

        let capsule = Rc::new(Capsule::new(ctx, kind, ptr, ownership));
        self.live
            .borrow_mut()
            .insert(address, Rc::downgrade(&capsule));
        debug!("wrapped {} {:#x} ({:?})", kind, address, ownership);
        capsule
    }

    pub(crate) fn lookup(&self, address: usize) -> Option<Rc<Capsule>> {
        let found = self.live.borrow().get(&address).and_then(Weak::upgrade);
        found.filter(|capsule| capsule.is_live())
    }

    /// Mark a capsule unusable; later unwraps fail with UseAfterFree.
    pub(crate) fn invalidate(&self, capsule: &Capsule, state: HandleState) {
        debug_assert_ne!(state, HandleState::Live);
        capsule.state.set(state);
        self.forget(capsule);
    }

    pub(crate) fn forget(&self, capsule: &Capsule) {
        let address = capsule.address();
        let mut live = self.live.borrow_mut();
        let ours = live
            .get(&address)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), capsule));
        if ours {
            live.remove(&address);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.live
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Lua Userdata
// ═══════════════════════════════════════════════════════════════════════════

/// The Lua-visible handle. Cloning shares the capsule.
#[derive(Clone)]
pub struct Handle(pub(crate) Rc<Capsule>);

impl Handle {
    pub fn capsule(&self) -> &Rc<Capsule> {
        &self.0
    }

    /// `handle:noteon(...)` resolves to `fluid_event_noteon(handle, ...)`.
    fn lookup_method(&self, lua: &Lua, key: &str) -> mlua::Result<Value> {
        let module: Table = lua.named_registry_value(MODULE_REGISTRY_KEY)?;
        let qualified = if key == "delete" {
            self.0.kind.destructor().to_string()
        } else {
            format!("{}{}", self.0.kind.method_prefix(), key)
        };
        module.raw_get(qualified)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.state() {
            HandleState::Live => write!(f, "fluid.{}: {:#x}", self.0.kind, self.0.address()),
            state => write!(f, "fluid.{} ({})", self.0.kind, state),
        }
    }
}

impl UserData for Handle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: Value| match key {
            Value::String(key) => this.lookup_method(lua, &key.to_str()?),
            _ => Ok(Value::Nil),
        });

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));

        methods.add_meta_function(
            MetaMethod::Eq,
            |_, (a, b): (UserDataRef<Handle>, UserDataRef<Handle>)| Ok(Rc::ptr_eq(&a.0, &b.0)),
        );
    }
}
