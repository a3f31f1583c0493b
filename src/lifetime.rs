// src/lifetime.rs
//
// Ownership transitions of native objects.
//
// A native object is freed exactly once, by whoever owns it:
//   - Owned capsules are freed by an explicit delete or on finalization.
//   - Borrowed capsules are never freed by the binding.
//   - Transferred capsules now belong to another engine object.
//
// Dependencies are recorded both ways. A dependent keeps its parents alive
// (strong refs), so finalization never frees a parent first. An explicit
// delete of a parent releases its dependents first, so nothing the host
// still holds points into freed memory.

use std::rc::Rc;

use log::{debug, trace};

use crate::engine::{AudioDriver, Event, Player, Sequencer, Settings, SoundFont, Synth};
use crate::handle::{Capsule, HandleKind, HandleState, Ownership};

impl Capsule {
    /// Free the native object now. Dependents go first.
    pub(crate) fn destroy(&self) {
        self.release(HandleState::Destroyed);
    }

    /// Engine took over the object; the host may no longer use it.
    pub(crate) fn transfer(&self) {
        self.ctx.handles.invalidate(self, HandleState::Transferred);
        self.sever();
        debug!("{} {:#x} transferred to the engine", self.kind, self.address());
    }

    /// Engine handed the object back; the host now frees it.
    pub(crate) fn adopt(&self) {
        self.ownership.set(Ownership::Owned);
        self.sever();
        debug!("{} {:#x} adopted", self.kind, self.address());
    }

    /// Record that `self` must not outlive `parent`.
    pub(crate) fn depend_on(self: &Rc<Self>, parent: &Rc<Capsule>) {
        let mut parents = self.parents.borrow_mut();
        if parents.iter().any(|p| Rc::ptr_eq(p, parent)) {
            return;
        }
        parents.push(Rc::clone(parent));
        parent.dependents.borrow_mut().push(Rc::downgrade(self));
    }

    /// Drop all parent links.
    pub(crate) fn sever(&self) {
        let parents = std::mem::take(&mut *self.parents.borrow_mut());
        for parent in &parents {
            parent
                .dependents
                .borrow_mut()
                .retain(|weak| !std::ptr::eq(weak.as_ptr(), self));
        }
    }

    fn release(&self, state: HandleState) {
        if !self.is_live() {
            return;
        }

        // Mark first so cycles through dependents stop here.
        self.ctx.handles.invalidate(self, state);

        let dependents = std::mem::take(&mut *self.dependents.borrow_mut());
        for dependent in dependents.iter().filter_map(|weak| weak.upgrade()) {
            trace!("{} {:#x} released with its parent", dependent.kind, dependent.address());
            dependent.release(HandleState::Destroyed);
        }

        if self.ownership.get() == Ownership::Owned {
            self.release_native();
        }
        self.sever();
    }

    fn release_native(&self) {
        let api = &self.ctx.api;
        debug!("deleting {} {:#x}", self.kind, self.address());
        unsafe {
            match self.kind {
                HandleKind::Settings => (api.delete_fluid_settings)(self.as_ptr::<Settings>()),
                HandleKind::Synth => (api.delete_fluid_synth)(self.as_ptr::<Synth>()),
                HandleKind::SoundFont => {
                    (api.delete_fluid_sfont)(self.as_ptr::<SoundFont>());
                }
                HandleKind::AudioDriver => {
                    (api.delete_fluid_audio_driver)(self.as_ptr::<AudioDriver>())
                }
                HandleKind::Player => (api.delete_fluid_player)(self.as_ptr::<Player>()),
                HandleKind::Sequencer => {
                    (api.delete_fluid_sequencer)(self.as_ptr::<Sequencer>());
                    self.ctx.callbacks.detach_sequencer(self.address());
                }
                HandleKind::Event => (api.delete_fluid_event)(self.as_ptr::<Event>()),
            }
        }
    }
}

impl Drop for Capsule {
    fn drop(&mut self) {
        // Parents are strong refs, so every dependent has already been
        // finalized or released by the time a parent gets here.
        if self.is_live() {
            self.ctx.handles.forget(self);
            if self.ownership.get() == Ownership::Owned {
                self.release_native();
            }
        }
        // Parents are still held here; take our entry out of their lists.
        self.sever();
    }
}
