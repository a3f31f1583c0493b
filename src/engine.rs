// src/engine.rs
//
// The FluidSynth C function table.
//
// Every native call in the crate goes through an `EngineApi`. The table is
// resolved once, when the module is opened, from the shared library. A
// missing symbol fails the open instead of failing at first use.

use std::ffi::{c_char, c_double, c_int, c_short, c_uint, c_void};
use std::fmt;
use std::path::PathBuf;

use libloading::Library;
use log::{debug, info};

use crate::config::BridgeConfig;
use crate::error::BindingError;
use crate::handle::{HandleKind, NativeObject};

#[cfg(test)]
pub(crate) mod fake;

// ═══════════════════════════════════════════════════════════════════════════
// Engine Constants
// ═══════════════════════════════════════════════════════════════════════════

pub const FLUID_OK: c_int = 0;
pub const FLUID_FAILED: c_int = -1;

/// Returned by `fluid_settings_get_type` for unknown names.
pub const FLUID_NO_TYPE: c_int = -1;
pub const FLUID_NUM_TYPE: c_int = 0;
pub const FLUID_INT_TYPE: c_int = 1;
pub const FLUID_STR_TYPE: c_int = 2;
pub const FLUID_SET_TYPE: c_int = 3;

pub const FLUID_PLAYER_READY: c_int = 0;
pub const FLUID_PLAYER_PLAYING: c_int = 1;
pub const FLUID_PLAYER_STOPPING: c_int = 2;
pub const FLUID_PLAYER_DONE: c_int = 3;

/// Sequencer client id (`fluid_seq_id_t`).
pub type SeqId = c_short;

/// `fluid_event_callback_t`
pub type EventCallback = unsafe extern "C" fn(
    time: c_uint,
    event: *mut Event,
    seq: *mut Sequencer,
    data: *mut c_void,
);

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Native Types
// ═══════════════════════════════════════════════════════════════════════════

macro_rules! opaque_types {
    ($($name:ident),* $(,)?) => {
        $(
            /// Opaque engine object, only ever seen behind a pointer.
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }

            impl NativeObject for $name {
                const KIND: HandleKind = HandleKind::$name;
            }
        )*
    };
}

opaque_types!(Settings, Synth, SoundFont, AudioDriver, Player, Sequencer, Event);

// ═══════════════════════════════════════════════════════════════════════════
// Function Table
// ═══════════════════════════════════════════════════════════════════════════

macro_rules! engine_api {
    ($( fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?; )*) => {
        /// C function table of the native engine.
        ///
        /// Field names are the exported symbol names.
        pub struct EngineApi {
            $(pub $name: unsafe extern "C" fn($($arg: $ty),*) $(-> $ret)?,)*
            library: Option<Library>,
        }

        impl EngineApi {
            fn resolve(library: Library) -> Result<Self, BindingError> {
                $(
                    let $name = unsafe {
                        *library
                            .get::<unsafe extern "C" fn($($ty),*) $(-> $ret)?>(
                                concat!(stringify!($name), "\0").as_bytes(),
                            )
                            .map_err(|source| BindingError::MissingSymbol {
                                symbol: stringify!($name),
                                source,
                            })?
                    };
                )*
                Ok(Self {
                    $($name,)*
                    library: Some(library),
                })
            }

            /// Table backed by the in-process fake engine.
            #[cfg(test)]
            pub(crate) fn fake() -> Self {
                Self {
                    $($name: fake::$name,)*
                    library: None,
                }
            }
        }
    };
}

engine_api! {
    // Settings
    fn new_fluid_settings() -> *mut Settings;
    fn delete_fluid_settings(settings: *mut Settings);
    fn fluid_settings_get_type(settings: *mut Settings, name: *const c_char) -> c_int;
    fn fluid_settings_setstr(settings: *mut Settings, name: *const c_char, value: *const c_char) -> c_int;
    fn fluid_settings_copystr(settings: *mut Settings, name: *const c_char, buf: *mut c_char, len: c_int) -> c_int;
    fn fluid_settings_setnum(settings: *mut Settings, name: *const c_char, value: c_double) -> c_int;
    fn fluid_settings_getnum(settings: *mut Settings, name: *const c_char, value: *mut c_double) -> c_int;
    fn fluid_settings_setint(settings: *mut Settings, name: *const c_char, value: c_int) -> c_int;
    fn fluid_settings_getint(settings: *mut Settings, name: *const c_char, value: *mut c_int) -> c_int;

    // Synth
    fn new_fluid_synth(settings: *mut Settings) -> *mut Synth;
    fn delete_fluid_synth(synth: *mut Synth);
    fn fluid_synth_sfload(synth: *mut Synth, filename: *const c_char, reset_presets: c_int) -> c_int;
    fn fluid_synth_sfunload(synth: *mut Synth, id: c_int, reset_presets: c_int) -> c_int;
    fn fluid_synth_sfcount(synth: *mut Synth) -> c_int;
    fn fluid_synth_get_sfont_by_id(synth: *mut Synth, id: c_int) -> *mut SoundFont;
    fn fluid_synth_add_sfont(synth: *mut Synth, sfont: *mut SoundFont) -> c_int;
    fn fluid_synth_remove_sfont(synth: *mut Synth, sfont: *mut SoundFont) -> c_int;
    fn fluid_synth_noteon(synth: *mut Synth, chan: c_int, key: c_int, vel: c_int) -> c_int;
    fn fluid_synth_noteoff(synth: *mut Synth, chan: c_int, key: c_int) -> c_int;
    fn fluid_synth_cc(synth: *mut Synth, chan: c_int, num: c_int, val: c_int) -> c_int;
    fn fluid_synth_program_change(synth: *mut Synth, chan: c_int, program: c_int) -> c_int;

    // SoundFont
    fn fluid_sfont_get_id(sfont: *mut SoundFont) -> c_int;
    fn fluid_sfont_get_name(sfont: *mut SoundFont) -> *const c_char;
    fn delete_fluid_sfont(sfont: *mut SoundFont) -> c_int;

    // Audio driver
    fn new_fluid_audio_driver(settings: *mut Settings, synth: *mut Synth) -> *mut AudioDriver;
    fn delete_fluid_audio_driver(driver: *mut AudioDriver);

    // Player
    fn new_fluid_player(synth: *mut Synth) -> *mut Player;
    fn delete_fluid_player(player: *mut Player);
    fn fluid_player_add(player: *mut Player, midifile: *const c_char) -> c_int;
    fn fluid_player_play(player: *mut Player) -> c_int;
    fn fluid_player_stop(player: *mut Player) -> c_int;
    fn fluid_player_join(player: *mut Player) -> c_int;
    fn fluid_player_get_status(player: *mut Player) -> c_int;
    fn fluid_player_set_loop(player: *mut Player, loop_count: c_int) -> c_int;
    fn fluid_player_set_bpm(player: *mut Player, bpm: c_int) -> c_int;

    // Sequencer
    fn new_fluid_sequencer2(use_system_timer: c_int) -> *mut Sequencer;
    fn delete_fluid_sequencer(seq: *mut Sequencer);
    fn fluid_sequencer_get_use_system_timer(seq: *mut Sequencer) -> c_int;
    fn fluid_sequencer_register_client(seq: *mut Sequencer, name: *const c_char, callback: EventCallback, data: *mut c_void) -> SeqId;
    fn fluid_sequencer_unregister_client(seq: *mut Sequencer, id: SeqId);
    fn fluid_sequencer_count_clients(seq: *mut Sequencer) -> c_int;
    fn fluid_sequencer_get_client_id(seq: *mut Sequencer, index: c_int) -> SeqId;
    fn fluid_sequencer_get_client_name(seq: *mut Sequencer, id: SeqId) -> *mut c_char;
    fn fluid_sequencer_client_is_dest(seq: *mut Sequencer, id: SeqId) -> c_int;
    fn fluid_sequencer_process(seq: *mut Sequencer, msec: c_uint);
    fn fluid_sequencer_send_now(seq: *mut Sequencer, evt: *mut Event);
    fn fluid_sequencer_send_at(seq: *mut Sequencer, evt: *mut Event, time: c_uint, absolute: c_int) -> c_int;
    fn fluid_sequencer_remove_events(seq: *mut Sequencer, source: SeqId, dest: SeqId, kind: c_int);
    fn fluid_sequencer_get_tick(seq: *mut Sequencer) -> c_uint;
    fn fluid_sequencer_set_time_scale(seq: *mut Sequencer, scale: c_double);
    fn fluid_sequencer_get_time_scale(seq: *mut Sequencer) -> c_double;
    fn fluid_sequencer_register_fluidsynth(seq: *mut Sequencer, synth: *mut Synth) -> SeqId;

    // Event
    fn new_fluid_event() -> *mut Event;
    fn delete_fluid_event(evt: *mut Event);
    fn fluid_event_set_source(evt: *mut Event, src: SeqId);
    fn fluid_event_set_dest(evt: *mut Event, dest: SeqId);
    fn fluid_event_timer(evt: *mut Event, data: *mut c_void);
    fn fluid_event_note(evt: *mut Event, channel: c_int, key: c_short, vel: c_short, duration: c_uint);
    fn fluid_event_noteon(evt: *mut Event, channel: c_int, key: c_short, vel: c_short);
    fn fluid_event_noteoff(evt: *mut Event, channel: c_int, key: c_short);
    fn fluid_event_all_sounds_off(evt: *mut Event, channel: c_int);
    fn fluid_event_all_notes_off(evt: *mut Event, channel: c_int);
    fn fluid_event_bank_select(evt: *mut Event, channel: c_int, bank_num: c_short);
    fn fluid_event_program_change(evt: *mut Event, channel: c_int, preset_num: c_int);
    fn fluid_event_program_select(evt: *mut Event, channel: c_int, sfont_id: c_uint, bank_num: c_short, preset_num: c_short);
    fn fluid_event_control_change(evt: *mut Event, channel: c_int, control: c_short, val: c_int);
    fn fluid_event_pitch_bend(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_pitch_wheelsens(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_modulation(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_sustain(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_pan(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_volume(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_reverb_send(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_chorus_send(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_channel_pressure(evt: *mut Event, channel: c_int, val: c_int);
    fn fluid_event_key_pressure(evt: *mut Event, channel: c_int, key: c_short, val: c_int);
    fn fluid_event_system_reset(evt: *mut Event);
    fn fluid_event_any_control_change(evt: *mut Event, channel: c_int);
    fn fluid_event_unregistering(evt: *mut Event);
    fn fluid_event_get_type(evt: *mut Event) -> c_int;
    fn fluid_event_get_source(evt: *mut Event) -> SeqId;
    fn fluid_event_get_dest(evt: *mut Event) -> SeqId;
    fn fluid_event_get_channel(evt: *mut Event) -> c_int;
    fn fluid_event_get_key(evt: *mut Event) -> c_short;
    fn fluid_event_get_velocity(evt: *mut Event) -> c_short;
    fn fluid_event_get_control(evt: *mut Event) -> c_short;
    fn fluid_event_get_value(evt: *mut Event) -> c_int;
    fn fluid_event_get_program(evt: *mut Event) -> c_int;
    fn fluid_event_get_data(evt: *mut Event) -> *mut c_void;
    fn fluid_event_get_duration(evt: *mut Event) -> c_uint;
    fn fluid_event_get_bank(evt: *mut Event) -> c_short;
    fn fluid_event_get_pitch(evt: *mut Event) -> c_int;
    fn fluid_event_get_sfont_id(evt: *mut Event) -> c_uint;

    // Misc
    fn fluid_is_soundfont(filename: *const c_char) -> c_int;
    fn fluid_is_midifile(filename: *const c_char) -> c_int;
}

// SAFETY: the table only holds plain function pointers and the library they
// were resolved from. The engine's own functions are thread-safe where the
// engine documents them to be; the crate only calls the event accessors off
// the host thread.
unsafe impl Send for EngineApi {}
unsafe impl Sync for EngineApi {}

impl EngineApi {
    /// Resolve the table from the engine's shared library.
    ///
    /// An explicit `config.library` is the only candidate when set; otherwise
    /// the platform's usual library names are tried in order.
    pub fn load(config: &BridgeConfig) -> Result<Self, BindingError> {
        let candidates: Vec<PathBuf> = match &config.library {
            Some(path) => vec![path.clone()],
            None => default_library_names().iter().map(PathBuf::from).collect(),
        };

        for candidate in &candidates {
            debug!("trying engine library {}", candidate.display());
            match unsafe { Library::new(candidate) } {
                Ok(library) => {
                    let api = Self::resolve(library)?;
                    info!("loaded engine library {}", candidate.display());
                    return Ok(api);
                }
                Err(err) => debug!("cannot open {}: {}", candidate.display(), err),
            }
        }

        Err(BindingError::EngineUnavailable {
            tried: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Whether the table was resolved from a shared library.
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

impl fmt::Debug for EngineApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineApi")
            .field("dynamic", &self.is_dynamic())
            .finish_non_exhaustive()
    }
}

fn default_library_names() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["libfluidsynth-3.dll", "libfluidsynth-2.dll", "fluidsynth.dll"]
    } else if cfg!(target_os = "macos") {
        &["libfluidsynth.3.dylib", "libfluidsynth.2.dylib", "libfluidsynth.dylib"]
    } else {
        &["libfluidsynth.so.3", "libfluidsynth.so.2", "libfluidsynth.so"]
    }
}
