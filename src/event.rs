// src/event.rs

use std::ffi::{c_int, c_short, c_uint, c_void};

use crate::engine::{EngineApi, Event, SeqId};

/// ===============================
/// Sequencer event types
/// ===============================

/// `fluid_seq_event_type`, in engine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum EventType {
    Note = 0,
    NoteOn,
    NoteOff,
    AllSoundsOff,
    AllNotesOff,
    BankSelect,
    ProgramChange,
    ProgramSelect,
    PitchBend,
    PitchWheelSens,
    Modulation,
    Sustain,
    ControlChange,
    Pan,
    Volume,
    ReverbSend,
    ChorusSend,
    Timer,
    AnyControlChange,
    ChannelPressure,
    KeyPressure,
    SystemReset,
    /// Last event a client receives.
    Unregistering,
}

impl EventType {
    pub const ALL: [EventType; 23] = [
        EventType::Note,
        EventType::NoteOn,
        EventType::NoteOff,
        EventType::AllSoundsOff,
        EventType::AllNotesOff,
        EventType::BankSelect,
        EventType::ProgramChange,
        EventType::ProgramSelect,
        EventType::PitchBend,
        EventType::PitchWheelSens,
        EventType::Modulation,
        EventType::Sustain,
        EventType::ControlChange,
        EventType::Pan,
        EventType::Volume,
        EventType::ReverbSend,
        EventType::ChorusSend,
        EventType::Timer,
        EventType::AnyControlChange,
        EventType::ChannelPressure,
        EventType::KeyPressure,
        EventType::SystemReset,
        EventType::Unregistering,
    ];

    pub fn from_raw(raw: c_int) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as c_int == raw)
    }

    pub fn raw(self) -> c_int {
        self as c_int
    }

    /// Key in the Lua `event_type` table.
    pub fn name(self) -> &'static str {
        match self {
            EventType::Note => "NOTE",
            EventType::NoteOn => "NOTEON",
            EventType::NoteOff => "NOTEOFF",
            EventType::AllSoundsOff => "ALLSOUNDSOFF",
            EventType::AllNotesOff => "ALLNOTESOFF",
            EventType::BankSelect => "BANKSELECT",
            EventType::ProgramChange => "PROGRAMCHANGE",
            EventType::ProgramSelect => "PROGRAMSELECT",
            EventType::PitchBend => "PITCHBEND",
            EventType::PitchWheelSens => "PITCHWHEELSENS",
            EventType::Modulation => "MODULATION",
            EventType::Sustain => "SUSTAIN",
            EventType::ControlChange => "CONTROLCHANGE",
            EventType::Pan => "PAN",
            EventType::Volume => "VOLUME",
            EventType::ReverbSend => "REVERBSEND",
            EventType::ChorusSend => "CHORUSSEND",
            EventType::Timer => "TIMER",
            EventType::AnyControlChange => "ANYCONTROLCHANGE",
            EventType::ChannelPressure => "CHANNELPRESSURE",
            EventType::KeyPressure => "KEYPRESSURE",
            EventType::SystemReset => "SYSTEMRESET",
            EventType::Unregistering => "UNREGISTERING",
        }
    }
}

/// ===============================
/// Detached event snapshots
/// ===============================

/// Plain copy of a native event.
///
/// These records:
/// - are taken on whatever thread the engine calls back on
/// - never point into engine memory (timer data is kept as an integer)
/// - are turned back into a native event on the host thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub kind: c_int,
    pub source: SeqId,
    pub dest: SeqId,
    pub channel: c_int,
    pub key: c_short,
    pub velocity: c_short,
    pub control: c_short,
    pub value: c_int,
    pub program: c_int,
    pub data: usize,
    pub duration: c_uint,
    pub bank: c_short,
    pub pitch: c_int,
    pub sfont_id: c_uint,
}

impl EventRecord {
    /// Read every field of `evt`.
    ///
    /// # Safety
    /// `evt` must point to a valid engine event for the duration of the call.
    pub unsafe fn capture(api: &EngineApi, evt: *mut Event) -> Self {
        unsafe {
            Self {
                kind: (api.fluid_event_get_type)(evt),
                source: (api.fluid_event_get_source)(evt),
                dest: (api.fluid_event_get_dest)(evt),
                channel: (api.fluid_event_get_channel)(evt),
                key: (api.fluid_event_get_key)(evt),
                velocity: (api.fluid_event_get_velocity)(evt),
                control: (api.fluid_event_get_control)(evt),
                value: (api.fluid_event_get_value)(evt),
                program: (api.fluid_event_get_program)(evt),
                data: (api.fluid_event_get_data)(evt) as usize,
                duration: (api.fluid_event_get_duration)(evt),
                bank: (api.fluid_event_get_bank)(evt),
                pitch: (api.fluid_event_get_pitch)(evt),
                sfont_id: (api.fluid_event_get_sfont_id)(evt),
            }
        }
    }

    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_raw(self.kind)
    }

    pub fn is_unregistering(&self) -> bool {
        self.event_type() == Some(EventType::Unregistering)
    }

    /// Write the snapshot into a fresh native event.
    ///
    /// Unknown types only get their addressing restored.
    ///
    /// # Safety
    /// `evt` must point to a valid engine event owned by the caller.
    pub unsafe fn restore(&self, api: &EngineApi, evt: *mut Event) {
        let ch = self.channel;
        unsafe {
            (api.fluid_event_set_source)(evt, self.source);
            (api.fluid_event_set_dest)(evt, self.dest);

            let Some(kind) = self.event_type() else {
                return;
            };
            match kind {
                EventType::Note => {
                    (api.fluid_event_note)(evt, ch, self.key, self.velocity, self.duration)
                }
                EventType::NoteOn => (api.fluid_event_noteon)(evt, ch, self.key, self.velocity),
                EventType::NoteOff => (api.fluid_event_noteoff)(evt, ch, self.key),
                EventType::AllSoundsOff => (api.fluid_event_all_sounds_off)(evt, ch),
                EventType::AllNotesOff => (api.fluid_event_all_notes_off)(evt, ch),
                EventType::BankSelect => (api.fluid_event_bank_select)(evt, ch, self.bank),
                EventType::ProgramChange => (api.fluid_event_program_change)(evt, ch, self.program),
                EventType::ProgramSelect => (api.fluid_event_program_select)(
                    evt,
                    ch,
                    self.sfont_id,
                    self.bank,
                    self.program as c_short,
                ),
                EventType::PitchBend => (api.fluid_event_pitch_bend)(evt, ch, self.pitch),
                EventType::PitchWheelSens => (api.fluid_event_pitch_wheelsens)(evt, ch, self.value),
                EventType::Modulation => (api.fluid_event_modulation)(evt, ch, self.value),
                EventType::Sustain => (api.fluid_event_sustain)(evt, ch, self.value),
                EventType::ControlChange => {
                    (api.fluid_event_control_change)(evt, ch, self.control, self.value)
                }
                EventType::Pan => (api.fluid_event_pan)(evt, ch, self.value),
                EventType::Volume => (api.fluid_event_volume)(evt, ch, self.value),
                EventType::ReverbSend => (api.fluid_event_reverb_send)(evt, ch, self.value),
                EventType::ChorusSend => (api.fluid_event_chorus_send)(evt, ch, self.value),
                EventType::Timer => (api.fluid_event_timer)(evt, self.data as *mut c_void),
                EventType::AnyControlChange => (api.fluid_event_any_control_change)(evt, ch),
                EventType::ChannelPressure => {
                    (api.fluid_event_channel_pressure)(evt, ch, self.value)
                }
                EventType::KeyPressure => {
                    (api.fluid_event_key_pressure)(evt, ch, self.key, self.value)
                }
                EventType::SystemReset => (api.fluid_event_system_reset)(evt),
                EventType::Unregistering => (api.fluid_event_unregistering)(evt),
            }
        }
    }
}
