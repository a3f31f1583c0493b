//! Bridge between engine callback threads and the Lua host.
//!
//! The sequencer calls client callbacks from whatever thread drives it: the
//! host thread inside `fluid_sequencer_process`, or the engine's own timer
//! thread when the sequencer uses the system timer. Lua may only be entered
//! from the host thread, one call at a time.
//!
//! # Architecture
//!
//! - **Engine side**: [`event_trampoline`] snapshots the event into an
//!   [`EventRecord`] and posts a [`Delivery`] on an MPSC channel. It never
//!   touches Lua.
//! - **Host side**: [`CallbackBridge::dispatch`] drains the channel and calls
//!   each client's Lua function with a fresh event handle. Dispatch is not
//!   reentrant, so callbacks run strictly one after another even when a
//!   callback itself makes the engine call back.
//!
//! A registration has two halves. The native half (`SlotCell`) is what the
//! engine's data pointer points at; it is freed as soon as the engine can no
//! longer call it. The host half (`Registration`) holds the Lua function and
//! user data; it is freed after its terminal UNREGISTERING event has been
//! delivered.
//!
//! Deliveries are only run on the host thread, by `dispatch()` or by the next
//! sequencer call. This includes the terminal events of a sequencer that was
//! garbage collected, so the host halves of its clients (callback and user
//! data) stay pinned until one of those runs, or until the context drops.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{CStr, c_uint, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, error, trace, warn};
use mlua::{Function, Lua, RegistryKey, Value};
use slotmap::{SlotMap, new_key_type};

use crate::context::Context;
use crate::engine::{EngineApi, Event, SeqId, Sequencer};
use crate::event::EventRecord;
use crate::handle::{Capsule, Handle, HandleKind, Ownership};
use crate::translate;

new_key_type! {
    /// One sequencer client registration.
    pub struct SlotId;
}

/// One engine callback, captured off the host thread.
#[derive(Debug, Clone, Copy)]
pub struct Delivery {
    pub slot: SlotId,
    pub time: u32,
    pub event: EventRecord,
}

/// Native half of a registration. Its heap address is the data pointer
/// handed to the engine.
struct SlotCell {
    slot: SlotId,
    api: Arc<EngineApi>,
    outbox: Sender<Delivery>,
}

/// Host half of a registration.
struct Registration {
    client: Option<SeqId>,
    sequencer: Weak<Capsule>,
    sequencer_address: usize,
    callback: RegistryKey,
    data: RegistryKey,
}

/// Engine entry point for every registered client.
///
/// # Safety
/// Called by the engine only, with `data` as passed to
/// `fluid_sequencer_register_client`.
pub(crate) unsafe extern "C" fn event_trampoline(
    time: c_uint,
    event: *mut Event,
    _seq: *mut Sequencer,
    data: *mut c_void,
) {
    if data.is_null() || event.is_null() {
        return;
    }
    // SAFETY: the cell stays allocated until the engine call that can
    // reach this client (unregister or delete) has returned.
    let cell = unsafe { &*(data as *const SlotCell) };

    let posted = panic::catch_unwind(AssertUnwindSafe(|| {
        let record = unsafe { EventRecord::capture(&cell.api, event) };
        cell.outbox
            .send(Delivery {
                slot: cell.slot,
                time,
                event: record,
            })
            .is_ok()
    }));

    match posted {
        Ok(true) => {}
        Ok(false) => warn!("binding context closed, dropping sequencer event"),
        Err(_) => error!("panic while capturing a sequencer event"),
    }
}

/// Resets the dispatch flag when a dispatch pass ends, error or not.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct CallbackBridge {
    api: Arc<EngineApi>,
    registrations: RefCell<SlotMap<SlotId, Registration>>,
    /// Native halves, with the address of the sequencer they belong to.
    cells: RefCell<HashMap<SlotId, (usize, Box<SlotCell>)>>,
    outbox: Sender<Delivery>,
    inbox: Receiver<Delivery>,
    dispatching: Cell<bool>,
}

impl CallbackBridge {
    pub fn new(api: Arc<EngineApi>) -> Self {
        let (outbox, inbox) = mpsc::channel();
        Self {
            api,
            registrations: RefCell::new(SlotMap::with_key()),
            cells: RefCell::new(HashMap::new()),
            outbox,
            inbox,
            dispatching: Cell::new(false),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Registration
    // ═══════════════════════════════════════════════════════════════════════

    /// Register a Lua client on `sequencer`.
    ///
    /// Both halves exist before the engine sees the data pointer; if the
    /// engine refuses the client, both are released and `None` is returned.
    ///
    /// The callback and user data are held strongly until the client is
    /// unregistered. A callback that captures its own sequencer keeps that
    /// sequencer alive until `fluid_sequencer_unregister_client` is called
    /// for it.
    pub(crate) fn register(
        &self,
        lua: &Lua,
        sequencer: &Rc<Capsule>,
        name: &CStr,
        callback: Function,
        data: Value,
    ) -> mlua::Result<Option<SeqId>> {
        let callback = lua.create_registry_value(callback)?;
        let data = lua.create_registry_value(data)?;
        let address = sequencer.address();

        let slot = self.registrations.borrow_mut().insert(Registration {
            client: None,
            sequencer: Rc::downgrade(sequencer),
            sequencer_address: address,
            callback,
            data,
        });
        let cell = Box::new(SlotCell {
            slot,
            api: Arc::clone(&self.api),
            outbox: self.outbox.clone(),
        });
        let cell_ptr = &*cell as *const SlotCell as *mut c_void;
        self.cells.borrow_mut().insert(slot, (address, cell));

        let id = unsafe {
            (self.api.fluid_sequencer_register_client)(
                sequencer.as_ptr(),
                name.as_ptr(),
                event_trampoline,
                cell_ptr,
            )
        };

        match translate::seq_id(id) {
            Some(id) => {
                if let Some(registration) = self.registrations.borrow_mut().get_mut(slot) {
                    registration.client = Some(id);
                }
                debug!("registered sequencer client {} {:?} on {:#x}", id, name, address);
                Ok(Some(id))
            }
            None => {
                self.cells.borrow_mut().remove(&slot);
                let removed = self.registrations.borrow_mut().remove(slot);
                if let Some(registration) = removed {
                    release_keys(lua, registration)?;
                }
                debug!("sequencer refused client {:?}, registration rolled back", name);
                Ok(None)
            }
        }
    }

    /// Unregister a client and deliver its terminal event.
    pub(crate) fn unregister(
        &self,
        lua: &Lua,
        ctx: &Rc<Context>,
        sequencer: &Rc<Capsule>,
        client: SeqId,
    ) -> mlua::Result<()> {
        let slot = self.slot_of(sequencer.address(), client);
        unsafe { (self.api.fluid_sequencer_unregister_client)(sequencer.as_ptr(), client) };

        // The engine has returned; it cannot call this client again.
        if let Some(slot) = slot {
            self.cells.borrow_mut().remove(&slot);
        }
        self.dispatch(lua, ctx)?;

        // An engine that sends no terminal event leaves the host half behind.
        // Inside a callback the terminal event may still be queued.
        if let Some(slot) = slot {
            if !self.is_dispatching() {
                let removed = self.registrations.borrow_mut().remove(slot);
                if let Some(registration) = removed {
                    debug!("client {} got no unregistering event, releasing", client);
                    release_keys(lua, registration)?;
                }
            }
        }
        Ok(())
    }

    /// The sequencer at `address` has been deleted: free its native halves.
    ///
    /// Host halves stay until their terminal events are dispatched.
    pub(crate) fn detach_sequencer(&self, address: usize) {
        let mut cells = self.cells.borrow_mut();
        let before = cells.len();
        cells.retain(|_, (owner, _)| *owner != address);
        trace!(
            "released {} callback cells of sequencer {:#x}",
            before - cells.len(),
            address
        );
    }

    fn slot_of(&self, address: usize, client: SeqId) -> Option<SlotId> {
        self.registrations
            .borrow()
            .iter()
            .find(|(_, r)| r.sequencer_address == address && r.client == Some(client))
            .map(|(slot, _)| slot)
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.borrow().len()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_dispatching(&self) -> bool {
        self.dispatching.get()
    }

    /// Run queued callbacks on the host thread.
    ///
    /// Returns the number of callbacks run. A call made while a dispatch is
    /// already running returns 0; the running pass picks up whatever the
    /// nested call queued.
    pub(crate) fn dispatch(&self, lua: &Lua, ctx: &Rc<Context>) -> mlua::Result<usize> {
        if self.dispatching.replace(true) {
            return Ok(0);
        }
        let _guard = DispatchGuard(&self.dispatching);

        let mut delivered = 0;
        while let Ok(delivery) = self.inbox.try_recv() {
            if self.deliver(lua, ctx, delivery)? {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    fn deliver(&self, lua: &Lua, ctx: &Rc<Context>, delivery: Delivery) -> mlua::Result<bool> {
        let target = {
            let registrations = self.registrations.borrow();
            match registrations.get(delivery.slot) {
                Some(r) => Some((
                    lua.registry_value::<Function>(&r.callback)?,
                    lua.registry_value::<Value>(&r.data)?,
                    r.sequencer.upgrade(),
                    r.sequencer_address,
                )),
                None => None,
            }
        };
        let Some((callback, data, sequencer, address)) = target else {
            trace!("dropping delivery for released slot {:?}", delivery.slot);
            return Ok(false);
        };

        let event = self.event_handle(lua, ctx, &delivery.event)?;
        let sequencer =
            sequencer.unwrap_or_else(|| Capsule::tombstone(ctx, HandleKind::Sequencer, address));
        let sequencer = lua.create_userdata(Handle(sequencer))?;

        trace!("dispatching event type {} at {}", delivery.event.kind, delivery.time);
        if let Err(err) = callback.call::<()>((delivery.time, event, sequencer, data)) {
            warn!("sequencer client callback failed: {}", err);
        }

        if delivery.event.is_unregistering() {
            let removed = self.registrations.borrow_mut().remove(delivery.slot);
            if let Some(registration) = removed {
                debug!("released registration {:?}", delivery.slot);
                release_keys(lua, registration)?;
            }
        }
        Ok(true)
    }

    /// A host-owned native event carrying the snapshot, or nil if the engine
    /// could not allocate one.
    fn event_handle(&self, lua: &Lua, ctx: &Rc<Context>, record: &EventRecord) -> mlua::Result<Value> {
        let Some(evt) = translate::object(unsafe { (self.api.new_fluid_event)() }) else {
            warn!("engine could not allocate an event for a callback");
            return Ok(Value::Nil);
        };
        unsafe { record.restore(&self.api, evt.as_ptr()) };
        Ok(Value::UserData(ctx.wrap(lua, evt, Ownership::Owned)?))
    }
}

fn release_keys(lua: &Lua, registration: Registration) -> mlua::Result<()> {
    lua.remove_registry_value(registration.callback)?;
    lua.remove_registry_value(registration.data)?;
    Ok(())
}

impl Drop for CallbackBridge {
    fn drop(&mut self) {
        let cells = self.cells.get_mut().len();
        if cells > 0 {
            warn!("{} sequencer clients still registered at teardown", cells);
        }
    }
}
