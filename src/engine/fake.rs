// src/engine/fake.rs
//
// In-process stand-in for the engine library, used by the test suite.
//
// Every function has the exact C signature of the symbol it replaces, so the
// binding goes through the same `EngineApi` table as in production. The
// behavior follows the engine's documented contracts closely enough for the
// binding's own logic to be exercised; it does no audio.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_double, c_int, c_short, c_uint, c_void};
use std::fs::File;
use std::io::Read;
use std::sync::Mutex;

use super::{
    AudioDriver, Event, EventCallback, FLUID_FAILED, FLUID_INT_TYPE, FLUID_NO_TYPE,
    FLUID_NUM_TYPE, FLUID_OK, FLUID_PLAYER_DONE, FLUID_PLAYER_PLAYING, FLUID_PLAYER_READY,
    FLUID_STR_TYPE, Player, SeqId, Sequencer, Settings, SoundFont, Synth,
};
use crate::event::EventType;

// ═══════════════════════════════════════════════════════════════════════════
// Bookkeeping
// ═══════════════════════════════════════════════════════════════════════════

thread_local! {
    static FREED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Addresses of every object freed on the calling thread, in order.
pub(crate) fn freed_on_this_thread() -> Vec<usize> {
    FREED.with(|freed| freed.borrow().clone())
}

fn record_free<T>(ptr: *mut T) {
    FREED.with(|freed| freed.borrow_mut().push(ptr as usize));
}

fn boxed<T, U>(value: T) -> *mut U {
    Box::into_raw(Box::new(value)).cast()
}

unsafe fn reclaim<T, U>(ptr: *mut U) -> Box<T> {
    record_free(ptr);
    unsafe { Box::from_raw(ptr.cast::<T>()) }
}

unsafe fn get<'a, T, U>(ptr: *mut U) -> &'a T {
    unsafe { &*ptr.cast::<T>() }
}

unsafe fn get_mut<'a, T, U>(ptr: *mut U) -> &'a mut T {
    unsafe { &mut *ptr.cast::<T>() }
}

unsafe fn text(ptr: *const c_char) -> String {
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

// ═══════════════════════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
enum Setting {
    Num(f64),
    Int(c_int),
    Str(String),
}

struct FakeSettings {
    values: Mutex<HashMap<String, Setting>>,
}

impl FakeSettings {
    fn lookup(&self, name: &str) -> Option<Setting> {
        self.values.lock().unwrap().get(name).cloned()
    }

    fn store(&self, name: &str, value: Setting) -> c_int {
        let mut values = self.values.lock().unwrap();
        let same_type = matches!(
            (values.get(name), &value),
            (Some(Setting::Num(_)), Setting::Num(_))
                | (Some(Setting::Int(_)), Setting::Int(_))
                | (Some(Setting::Str(_)), Setting::Str(_))
        );
        if !same_type {
            return FLUID_FAILED;
        }
        values.insert(name.to_string(), value);
        FLUID_OK
    }
}

pub(crate) unsafe extern "C" fn new_fluid_settings() -> *mut Settings {
    let mut values = HashMap::new();
    values.insert("synth.gain".to_string(), Setting::Num(0.2));
    values.insert("synth.sample-rate".to_string(), Setting::Num(44100.0));
    values.insert("synth.polyphony".to_string(), Setting::Int(256));
    values.insert("synth.verbose".to_string(), Setting::Int(0));
    values.insert("audio.driver".to_string(), Setting::Str("file".to_string()));
    values.insert("synth.default-soundfont".to_string(), Setting::Str(String::new()));
    boxed(FakeSettings {
        values: Mutex::new(values),
    })
}

pub(crate) unsafe extern "C" fn delete_fluid_settings(settings: *mut Settings) {
    drop(unsafe { reclaim::<FakeSettings, _>(settings) });
}

pub(crate) unsafe extern "C" fn fluid_settings_get_type(settings: *mut Settings, name: *const c_char) -> c_int {
    let s = unsafe { get::<FakeSettings, _>(settings) };
    match s.lookup(&unsafe { text(name) }) {
        Some(Setting::Num(_)) => FLUID_NUM_TYPE,
        Some(Setting::Int(_)) => FLUID_INT_TYPE,
        Some(Setting::Str(_)) => FLUID_STR_TYPE,
        None => FLUID_NO_TYPE,
    }
}

pub(crate) unsafe extern "C" fn fluid_settings_setstr(
    settings: *mut Settings,
    name: *const c_char,
    value: *const c_char,
) -> c_int {
    let s = unsafe { get::<FakeSettings, _>(settings) };
    unsafe { s.store(&text(name), Setting::Str(text(value))) }
}

pub(crate) unsafe extern "C" fn fluid_settings_copystr(
    settings: *mut Settings,
    name: *const c_char,
    buf: *mut c_char,
    len: c_int,
) -> c_int {
    let s = unsafe { get::<FakeSettings, _>(settings) };
    let Some(Setting::Str(value)) = s.lookup(&unsafe { text(name) }) else {
        return FLUID_FAILED;
    };
    if buf.is_null() || len <= 0 {
        return FLUID_FAILED;
    }
    let bytes = value.as_bytes();
    let n = bytes.len().min(len as usize - 1);
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buf, n);
        *buf.add(n) = 0;
    }
    FLUID_OK
}

pub(crate) unsafe extern "C" fn fluid_settings_setnum(settings: *mut Settings, name: *const c_char, value: c_double) -> c_int {
    let s = unsafe { get::<FakeSettings, _>(settings) };
    s.store(&unsafe { text(name) }, Setting::Num(value))
}

pub(crate) unsafe extern "C" fn fluid_settings_getnum(settings: *mut Settings, name: *const c_char, value: *mut c_double) -> c_int {
    let s = unsafe { get::<FakeSettings, _>(settings) };
    match s.lookup(&unsafe { text(name) }) {
        Some(Setting::Num(n)) => {
            unsafe { *value = n };
            FLUID_OK
        }
        _ => FLUID_FAILED,
    }
}

pub(crate) unsafe extern "C" fn fluid_settings_setint(settings: *mut Settings, name: *const c_char, value: c_int) -> c_int {
    let s = unsafe { get::<FakeSettings, _>(settings) };
    s.store(&unsafe { text(name) }, Setting::Int(value))
}

pub(crate) unsafe extern "C" fn fluid_settings_getint(settings: *mut Settings, name: *const c_char, value: *mut c_int) -> c_int {
    let s = unsafe { get::<FakeSettings, _>(settings) };
    match s.lookup(&unsafe { text(name) }) {
        Some(Setting::Int(i)) => {
            unsafe { *value = i };
            FLUID_OK
        }
        _ => FLUID_FAILED,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Synth and SoundFonts
// ═══════════════════════════════════════════════════════════════════════════

struct FakeFont {
    id: c_int,
    name: CString,
}

struct SynthState {
    /// Addresses of the loaded fonts, owned by the synth.
    fonts: Vec<usize>,
    next_id: c_int,
}

struct FakeSynth {
    state: Mutex<SynthState>,
}

pub(crate) unsafe extern "C" fn new_fluid_synth(settings: *mut Settings) -> *mut Synth {
    if settings.is_null() {
        return std::ptr::null_mut();
    }
    boxed(FakeSynth {
        state: Mutex::new(SynthState {
            fonts: Vec::new(),
            next_id: 1,
        }),
    })
}

pub(crate) unsafe extern "C" fn delete_fluid_synth(synth: *mut Synth) {
    let synth = unsafe { reclaim::<FakeSynth, _>(synth) };
    let fonts = std::mem::take(&mut synth.state.lock().unwrap().fonts);
    for font in fonts {
        drop(unsafe { reclaim::<FakeFont, _>(font as *mut SoundFont) });
    }
}

pub(crate) unsafe extern "C" fn fluid_synth_sfload(synth: *mut Synth, filename: *const c_char, _reset_presets: c_int) -> c_int {
    let synth = unsafe { get::<FakeSynth, _>(synth) };
    let name = unsafe { text(filename) };
    if !(name.ends_with(".sf2") || name.ends_with(".sf3")) {
        return FLUID_FAILED;
    }
    let mut state = synth.state.lock().unwrap();
    let id = state.next_id;
    state.next_id += 1;
    let font: *mut SoundFont = boxed(FakeFont {
        id,
        name: CString::new(name).unwrap(),
    });
    state.fonts.push(font as usize);
    id
}

pub(crate) unsafe extern "C" fn fluid_synth_sfunload(synth: *mut Synth, id: c_int, _reset_presets: c_int) -> c_int {
    let synth = unsafe { get::<FakeSynth, _>(synth) };
    let mut state = synth.state.lock().unwrap();
    let Some(at) = state
        .fonts
        .iter()
        .position(|f| unsafe { get::<FakeFont, _>(*f as *mut SoundFont) }.id == id)
    else {
        return FLUID_FAILED;
    };
    let font = state.fonts.remove(at);
    drop(unsafe { reclaim::<FakeFont, _>(font as *mut SoundFont) });
    FLUID_OK
}

pub(crate) unsafe extern "C" fn fluid_synth_sfcount(synth: *mut Synth) -> c_int {
    let synth = unsafe { get::<FakeSynth, _>(synth) };
    synth.state.lock().unwrap().fonts.len() as c_int
}

pub(crate) unsafe extern "C" fn fluid_synth_get_sfont_by_id(synth: *mut Synth, id: c_int) -> *mut SoundFont {
    let synth = unsafe { get::<FakeSynth, _>(synth) };
    let state = synth.state.lock().unwrap();
    state
        .fonts
        .iter()
        .copied()
        .find(|f| unsafe { get::<FakeFont, _>(*f as *mut SoundFont) }.id == id)
        .map_or(std::ptr::null_mut(), |f| f as *mut SoundFont)
}

pub(crate) unsafe extern "C" fn fluid_synth_add_sfont(synth: *mut Synth, sfont: *mut SoundFont) -> c_int {
    let synth = unsafe { get::<FakeSynth, _>(synth) };
    let mut state = synth.state.lock().unwrap();
    if state.fonts.contains(&(sfont as usize)) {
        return FLUID_FAILED;
    }
    let id = state.next_id;
    state.next_id += 1;
    unsafe { get_mut::<FakeFont, _>(sfont) }.id = id;
    state.fonts.push(sfont as usize);
    id
}

pub(crate) unsafe extern "C" fn fluid_synth_remove_sfont(synth: *mut Synth, sfont: *mut SoundFont) -> c_int {
    let synth = unsafe { get::<FakeSynth, _>(synth) };
    let mut state = synth.state.lock().unwrap();
    let before = state.fonts.len();
    state.fonts.retain(|f| *f != sfont as usize);
    if state.fonts.len() == before {
        FLUID_FAILED
    } else {
        FLUID_OK
    }
}

fn midi_range(values: &[c_int]) -> c_int {
    if values.iter().all(|v| (0..=127).contains(v)) {
        FLUID_OK
    } else {
        FLUID_FAILED
    }
}

fn channel_range(chan: c_int) -> bool {
    (0..16).contains(&chan)
}

pub(crate) unsafe extern "C" fn fluid_synth_noteon(_synth: *mut Synth, chan: c_int, key: c_int, vel: c_int) -> c_int {
    if !channel_range(chan) {
        return FLUID_FAILED;
    }
    midi_range(&[key, vel])
}

pub(crate) unsafe extern "C" fn fluid_synth_noteoff(_synth: *mut Synth, chan: c_int, key: c_int) -> c_int {
    if !channel_range(chan) {
        return FLUID_FAILED;
    }
    midi_range(&[key])
}

pub(crate) unsafe extern "C" fn fluid_synth_cc(_synth: *mut Synth, chan: c_int, num: c_int, val: c_int) -> c_int {
    if !channel_range(chan) {
        return FLUID_FAILED;
    }
    midi_range(&[num, val])
}

pub(crate) unsafe extern "C" fn fluid_synth_program_change(_synth: *mut Synth, chan: c_int, program: c_int) -> c_int {
    if !channel_range(chan) {
        return FLUID_FAILED;
    }
    midi_range(&[program])
}

pub(crate) unsafe extern "C" fn fluid_sfont_get_id(sfont: *mut SoundFont) -> c_int {
    unsafe { get::<FakeFont, _>(sfont) }.id
}

pub(crate) unsafe extern "C" fn fluid_sfont_get_name(sfont: *mut SoundFont) -> *const c_char {
    unsafe { get::<FakeFont, _>(sfont) }.name.as_ptr()
}

pub(crate) unsafe extern "C" fn delete_fluid_sfont(sfont: *mut SoundFont) -> c_int {
    drop(unsafe { reclaim::<FakeFont, _>(sfont) });
    FLUID_OK
}

// ═══════════════════════════════════════════════════════════════════════════
// Audio Driver
// ═══════════════════════════════════════════════════════════════════════════

struct FakeDriver {
    _driver: String,
}

/// Fails when `audio.driver` is "none", the way the engine fails for a
/// driver that cannot be opened.
pub(crate) unsafe extern "C" fn new_fluid_audio_driver(settings: *mut Settings, synth: *mut Synth) -> *mut AudioDriver {
    if settings.is_null() || synth.is_null() {
        return std::ptr::null_mut();
    }
    let s = unsafe { get::<FakeSettings, _>(settings) };
    match s.lookup("audio.driver") {
        Some(Setting::Str(driver)) if driver != "none" => boxed(FakeDriver { _driver: driver }),
        _ => std::ptr::null_mut(),
    }
}

pub(crate) unsafe extern "C" fn delete_fluid_audio_driver(driver: *mut AudioDriver) {
    drop(unsafe { reclaim::<FakeDriver, _>(driver) });
}

// ═══════════════════════════════════════════════════════════════════════════
// Player
// ═══════════════════════════════════════════════════════════════════════════

struct PlayerState {
    files: Vec<String>,
    status: c_int,
}

struct FakePlayer {
    state: Mutex<PlayerState>,
}

impl FakePlayer {
    fn with<R>(player: *mut Player, f: impl FnOnce(&mut PlayerState) -> R) -> R {
        let player = unsafe { get::<FakePlayer, _>(player) };
        f(&mut player.state.lock().unwrap())
    }
}

pub(crate) unsafe extern "C" fn new_fluid_player(synth: *mut Synth) -> *mut Player {
    if synth.is_null() {
        return std::ptr::null_mut();
    }
    boxed(FakePlayer {
        state: Mutex::new(PlayerState {
            files: Vec::new(),
            status: FLUID_PLAYER_READY,
        }),
    })
}

pub(crate) unsafe extern "C" fn delete_fluid_player(player: *mut Player) {
    drop(unsafe { reclaim::<FakePlayer, _>(player) });
}

pub(crate) unsafe extern "C" fn fluid_player_add(player: *mut Player, midifile: *const c_char) -> c_int {
    let name = unsafe { text(midifile) };
    if !name.ends_with(".mid") {
        return FLUID_FAILED;
    }
    FakePlayer::with(player, |state| state.files.push(name));
    FLUID_OK
}

pub(crate) unsafe extern "C" fn fluid_player_play(player: *mut Player) -> c_int {
    FakePlayer::with(player, |state| {
        if state.files.is_empty() {
            return FLUID_FAILED;
        }
        state.status = FLUID_PLAYER_PLAYING;
        FLUID_OK
    })
}

pub(crate) unsafe extern "C" fn fluid_player_stop(player: *mut Player) -> c_int {
    FakePlayer::with(player, |state| state.status = FLUID_PLAYER_DONE);
    FLUID_OK
}

pub(crate) unsafe extern "C" fn fluid_player_join(player: *mut Player) -> c_int {
    FakePlayer::with(player, |state| {
        if state.status == FLUID_PLAYER_PLAYING {
            state.status = FLUID_PLAYER_DONE;
        }
    });
    FLUID_OK
}

pub(crate) unsafe extern "C" fn fluid_player_get_status(player: *mut Player) -> c_int {
    FakePlayer::with(player, |state| state.status)
}

pub(crate) unsafe extern "C" fn fluid_player_set_loop(_player: *mut Player, _loop_count: c_int) -> c_int {
    FLUID_OK
}

pub(crate) unsafe extern "C" fn fluid_player_set_bpm(_player: *mut Player, bpm: c_int) -> c_int {
    if bpm <= 0 { FLUID_FAILED } else { FLUID_OK }
}

// ═══════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct FakeEvent {
    kind: c_int,
    source: SeqId,
    dest: SeqId,
    channel: c_int,
    key: c_short,
    velocity: c_short,
    control: c_short,
    value: c_int,
    program: c_int,
    data: usize,
    duration: c_uint,
    bank: c_short,
    pitch: c_int,
    sfont_id: c_uint,
}

impl FakeEvent {
    fn blank() -> Self {
        Self {
            kind: -1,
            source: -1,
            dest: -1,
            channel: 0,
            key: 0,
            velocity: 0,
            control: 0,
            value: 0,
            program: 0,
            data: 0,
            duration: 0,
            bank: 0,
            pitch: 0,
            sfont_id: 0,
        }
    }

    fn addressed(kind: EventType, dest: SeqId) -> Self {
        Self {
            kind: kind.raw(),
            dest,
            ..Self::blank()
        }
    }
}

/// Switch `evt` to `kind`, clearing the payload but keeping its addressing.
unsafe fn reshape<'a>(evt: *mut Event, kind: EventType) -> &'a mut FakeEvent {
    let e = unsafe { get_mut::<FakeEvent, _>(evt) };
    *e = FakeEvent {
        kind: kind.raw(),
        source: e.source,
        dest: e.dest,
        ..FakeEvent::blank()
    };
    e
}

pub(crate) unsafe extern "C" fn new_fluid_event() -> *mut Event {
    boxed(FakeEvent::blank())
}

pub(crate) unsafe extern "C" fn delete_fluid_event(evt: *mut Event) {
    drop(unsafe { reclaim::<FakeEvent, _>(evt) });
}

pub(crate) unsafe extern "C" fn fluid_event_set_source(evt: *mut Event, src: SeqId) {
    unsafe { get_mut::<FakeEvent, _>(evt) }.source = src;
}

pub(crate) unsafe extern "C" fn fluid_event_set_dest(evt: *mut Event, dest: SeqId) {
    unsafe { get_mut::<FakeEvent, _>(evt) }.dest = dest;
}

pub(crate) unsafe extern "C" fn fluid_event_timer(evt: *mut Event, data: *mut c_void) {
    unsafe { reshape(evt, EventType::Timer) }.data = data as usize;
}

pub(crate) unsafe extern "C" fn fluid_event_note(evt: *mut Event, channel: c_int, key: c_short, vel: c_short, duration: c_uint) {
    let e = unsafe { reshape(evt, EventType::Note) };
    e.channel = channel;
    e.key = key;
    e.velocity = vel;
    e.duration = duration;
}

pub(crate) unsafe extern "C" fn fluid_event_noteon(evt: *mut Event, channel: c_int, key: c_short, vel: c_short) {
    let e = unsafe { reshape(evt, EventType::NoteOn) };
    e.channel = channel;
    e.key = key;
    e.velocity = vel;
}

pub(crate) unsafe extern "C" fn fluid_event_noteoff(evt: *mut Event, channel: c_int, key: c_short) {
    let e = unsafe { reshape(evt, EventType::NoteOff) };
    e.channel = channel;
    e.key = key;
}

pub(crate) unsafe extern "C" fn fluid_event_all_sounds_off(evt: *mut Event, channel: c_int) {
    unsafe { reshape(evt, EventType::AllSoundsOff) }.channel = channel;
}

pub(crate) unsafe extern "C" fn fluid_event_all_notes_off(evt: *mut Event, channel: c_int) {
    unsafe { reshape(evt, EventType::AllNotesOff) }.channel = channel;
}

pub(crate) unsafe extern "C" fn fluid_event_bank_select(evt: *mut Event, channel: c_int, bank_num: c_short) {
    let e = unsafe { reshape(evt, EventType::BankSelect) };
    e.channel = channel;
    e.bank = bank_num;
}

pub(crate) unsafe extern "C" fn fluid_event_program_change(evt: *mut Event, channel: c_int, preset_num: c_int) {
    let e = unsafe { reshape(evt, EventType::ProgramChange) };
    e.channel = channel;
    e.program = preset_num;
}

pub(crate) unsafe extern "C" fn fluid_event_program_select(
    evt: *mut Event,
    channel: c_int,
    sfont_id: c_uint,
    bank_num: c_short,
    preset_num: c_short,
) {
    let e = unsafe { reshape(evt, EventType::ProgramSelect) };
    e.channel = channel;
    e.sfont_id = sfont_id;
    e.bank = bank_num;
    e.program = preset_num as c_int;
}

pub(crate) unsafe extern "C" fn fluid_event_control_change(evt: *mut Event, channel: c_int, control: c_short, val: c_int) {
    let e = unsafe { reshape(evt, EventType::ControlChange) };
    e.channel = channel;
    e.control = control;
    e.value = val;
}

pub(crate) unsafe extern "C" fn fluid_event_pitch_bend(evt: *mut Event, channel: c_int, val: c_int) {
    let e = unsafe { reshape(evt, EventType::PitchBend) };
    e.channel = channel;
    e.pitch = val.clamp(0, 16383);
}

unsafe fn channel_value(evt: *mut Event, kind: EventType, channel: c_int, val: c_int) {
    let e = unsafe { reshape(evt, kind) };
    e.channel = channel;
    e.value = val;
}

pub(crate) unsafe extern "C" fn fluid_event_pitch_wheelsens(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::PitchWheelSens, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_modulation(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::Modulation, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_sustain(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::Sustain, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_pan(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::Pan, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_volume(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::Volume, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_reverb_send(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::ReverbSend, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_chorus_send(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::ChorusSend, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_channel_pressure(evt: *mut Event, channel: c_int, val: c_int) {
    unsafe { channel_value(evt, EventType::ChannelPressure, channel, val) }
}

pub(crate) unsafe extern "C" fn fluid_event_key_pressure(evt: *mut Event, channel: c_int, key: c_short, val: c_int) {
    let e = unsafe { reshape(evt, EventType::KeyPressure) };
    e.channel = channel;
    e.key = key;
    e.value = val;
}

pub(crate) unsafe extern "C" fn fluid_event_system_reset(evt: *mut Event) {
    unsafe { reshape(evt, EventType::SystemReset) };
}

pub(crate) unsafe extern "C" fn fluid_event_any_control_change(evt: *mut Event, channel: c_int) {
    unsafe { reshape(evt, EventType::AnyControlChange) }.channel = channel;
}

pub(crate) unsafe extern "C" fn fluid_event_unregistering(evt: *mut Event) {
    unsafe { reshape(evt, EventType::Unregistering) };
}

macro_rules! event_getters {
    ($($name:ident -> $ty:ty => $field:ident;)*) => {
        $(
            pub(crate) unsafe extern "C" fn $name(evt: *mut Event) -> $ty {
                unsafe { get::<FakeEvent, _>(evt) }.$field
            }
        )*
    };
}

event_getters! {
    fluid_event_get_type -> c_int => kind;
    fluid_event_get_source -> SeqId => source;
    fluid_event_get_dest -> SeqId => dest;
    fluid_event_get_channel -> c_int => channel;
    fluid_event_get_key -> c_short => key;
    fluid_event_get_velocity -> c_short => velocity;
    fluid_event_get_control -> c_short => control;
    fluid_event_get_value -> c_int => value;
    fluid_event_get_program -> c_int => program;
    fluid_event_get_duration -> c_uint => duration;
    fluid_event_get_bank -> c_short => bank;
    fluid_event_get_pitch -> c_int => pitch;
    fluid_event_get_sfont_id -> c_uint => sfont_id;
}

pub(crate) unsafe extern "C" fn fluid_event_get_data(evt: *mut Event) -> *mut c_void {
    unsafe { get::<FakeEvent, _>(evt) }.data as *mut c_void
}

// ═══════════════════════════════════════════════════════════════════════════
// Sequencer
// ═══════════════════════════════════════════════════════════════════════════

struct Client {
    id: SeqId,
    name: CString,
    callback: Option<(EventCallback, usize)>,
}

struct SeqState {
    tick: c_uint,
    scale: f64,
    next_id: SeqId,
    clients: Vec<Client>,
    queue: Vec<(c_uint, FakeEvent)>,
}

struct FakeSequencer {
    system_timer: bool,
    state: Mutex<SeqState>,
}

impl FakeSequencer {
    fn of<'a>(seq: *mut Sequencer) -> &'a FakeSequencer {
        unsafe { get::<FakeSequencer, _>(seq) }
    }

    fn callback_of(&self, dest: SeqId) -> Option<(EventCallback, usize)> {
        let state = self.state.lock().unwrap();
        state
            .clients
            .iter()
            .find(|c| c.id == dest)
            .and_then(|c| c.callback)
    }
}

/// Call `dest`'s callback without holding the sequencer lock, so the
/// callback may call back into the sequencer.
fn deliver(seq: *mut Sequencer, time: c_uint, mut event: FakeEvent) {
    let Some((callback, data)) = FakeSequencer::of(seq).callback_of(event.dest) else {
        return;
    };
    let evt = (&mut event as *mut FakeEvent).cast::<Event>();
    unsafe { callback(time, evt, seq, data as *mut c_void) };
}

fn deliver_unregistering(seq: *mut Sequencer, client: &Client, time: c_uint) {
    if let Some((callback, data)) = client.callback {
        let mut event = FakeEvent::addressed(EventType::Unregistering, client.id);
        let evt = (&mut event as *mut FakeEvent).cast::<Event>();
        unsafe { callback(time, evt, seq, data as *mut c_void) };
    }
}

/// Fire a timer event at every callback client of the sequencer at
/// `seq_address`, from the calling thread, the way the engine's system
/// timer thread would.
pub(crate) fn fire_timer(seq_address: usize, time: c_uint, data: usize) {
    let seq = seq_address as *mut Sequencer;
    let targets: Vec<(SeqId, EventCallback, usize)> = {
        let state = FakeSequencer::of(seq).state.lock().unwrap();
        state
            .clients
            .iter()
            .filter_map(|c| c.callback.map(|(cb, d)| (c.id, cb, d)))
            .collect()
    };
    for (id, callback, client_data) in targets {
        let mut event = FakeEvent::addressed(EventType::Timer, id);
        event.data = data;
        let evt = (&mut event as *mut FakeEvent).cast::<Event>();
        unsafe { callback(time, evt, seq, client_data as *mut c_void) };
    }
}

pub(crate) unsafe extern "C" fn new_fluid_sequencer2(use_system_timer: c_int) -> *mut Sequencer {
    boxed(FakeSequencer {
        system_timer: use_system_timer != 0,
        state: Mutex::new(SeqState {
            tick: 0,
            scale: 1000.0,
            next_id: 0,
            clients: Vec::new(),
            queue: Vec::new(),
        }),
    })
}

pub(crate) unsafe extern "C" fn delete_fluid_sequencer(seq: *mut Sequencer) {
    let (clients, tick) = {
        let mut state = FakeSequencer::of(seq).state.lock().unwrap();
        (std::mem::take(&mut state.clients), state.tick)
    };
    for client in &clients {
        deliver_unregistering(seq, client, tick);
    }
    drop(unsafe { reclaim::<FakeSequencer, _>(seq) });
}

pub(crate) unsafe extern "C" fn fluid_sequencer_get_use_system_timer(seq: *mut Sequencer) -> c_int {
    FakeSequencer::of(seq).system_timer as c_int
}

pub(crate) unsafe extern "C" fn fluid_sequencer_register_client(
    seq: *mut Sequencer,
    name: *const c_char,
    callback: EventCallback,
    data: *mut c_void,
) -> SeqId {
    let name = unsafe { CStr::from_ptr(name) }.to_owned();
    if name.is_empty() {
        return FLUID_FAILED as SeqId;
    }
    let mut state = FakeSequencer::of(seq).state.lock().unwrap();
    let id = state.next_id;
    state.next_id += 1;
    state.clients.push(Client {
        id,
        name,
        callback: Some((callback, data as usize)),
    });
    id
}

pub(crate) unsafe extern "C" fn fluid_sequencer_unregister_client(seq: *mut Sequencer, id: SeqId) {
    let (client, tick) = {
        let mut state = FakeSequencer::of(seq).state.lock().unwrap();
        let Some(at) = state.clients.iter().position(|c| c.id == id) else {
            return;
        };
        (state.clients.remove(at), state.tick)
    };
    deliver_unregistering(seq, &client, tick);
}

pub(crate) unsafe extern "C" fn fluid_sequencer_count_clients(seq: *mut Sequencer) -> c_int {
    FakeSequencer::of(seq).state.lock().unwrap().clients.len() as c_int
}

pub(crate) unsafe extern "C" fn fluid_sequencer_get_client_id(seq: *mut Sequencer, index: c_int) -> SeqId {
    let state = FakeSequencer::of(seq).state.lock().unwrap();
    usize::try_from(index)
        .ok()
        .and_then(|i| state.clients.get(i))
        .map_or(FLUID_FAILED as SeqId, |c| c.id)
}

pub(crate) unsafe extern "C" fn fluid_sequencer_get_client_name(seq: *mut Sequencer, id: SeqId) -> *mut c_char {
    let state = FakeSequencer::of(seq).state.lock().unwrap();
    state
        .clients
        .iter()
        .find(|c| c.id == id)
        .map_or(std::ptr::null_mut(), |c| c.name.as_ptr() as *mut c_char)
}

pub(crate) unsafe extern "C" fn fluid_sequencer_client_is_dest(seq: *mut Sequencer, id: SeqId) -> c_int {
    let state = FakeSequencer::of(seq).state.lock().unwrap();
    state.clients.iter().any(|c| c.id == id) as c_int
}

pub(crate) unsafe extern "C" fn fluid_sequencer_process(seq: *mut Sequencer, msec: c_uint) {
    let due = {
        let mut state = FakeSequencer::of(seq).state.lock().unwrap();
        state.tick = (msec as f64 * state.scale / 1000.0) as c_uint;
        let tick = state.tick;
        let mut due: Vec<(c_uint, FakeEvent)> = Vec::new();
        state.queue.retain(|(time, event)| {
            if *time <= tick {
                due.push((*time, *event));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(time, _)| *time);
        due
    };
    for (time, event) in due {
        deliver(seq, time, event);
    }
}

pub(crate) unsafe extern "C" fn fluid_sequencer_send_now(seq: *mut Sequencer, evt: *mut Event) {
    let event = *unsafe { get::<FakeEvent, _>(evt) };
    let tick = FakeSequencer::of(seq).state.lock().unwrap().tick;
    deliver(seq, tick, event);
}

pub(crate) unsafe extern "C" fn fluid_sequencer_send_at(seq: *mut Sequencer, evt: *mut Event, time: c_uint, absolute: c_int) -> c_int {
    let event = *unsafe { get::<FakeEvent, _>(evt) };
    let mut state = FakeSequencer::of(seq).state.lock().unwrap();
    if !state.clients.iter().any(|c| c.id == event.dest) {
        return FLUID_FAILED;
    }
    let at = if absolute != 0 { time } else { state.tick + time };
    state.queue.push((at, event));
    FLUID_OK
}

pub(crate) unsafe extern "C" fn fluid_sequencer_remove_events(seq: *mut Sequencer, source: SeqId, dest: SeqId, kind: c_int) {
    let mut state = FakeSequencer::of(seq).state.lock().unwrap();
    state.queue.retain(|(_, e)| {
        let matches = (source == -1 || e.source == source)
            && (dest == -1 || e.dest == dest)
            && (kind == -1 || e.kind == kind);
        !matches
    });
}

pub(crate) unsafe extern "C" fn fluid_sequencer_get_tick(seq: *mut Sequencer) -> c_uint {
    FakeSequencer::of(seq).state.lock().unwrap().tick
}

pub(crate) unsafe extern "C" fn fluid_sequencer_set_time_scale(seq: *mut Sequencer, scale: c_double) {
    if scale > 0.0 {
        FakeSequencer::of(seq).state.lock().unwrap().scale = scale;
    }
}

pub(crate) unsafe extern "C" fn fluid_sequencer_get_time_scale(seq: *mut Sequencer) -> c_double {
    FakeSequencer::of(seq).state.lock().unwrap().scale
}

pub(crate) unsafe extern "C" fn fluid_sequencer_register_fluidsynth(seq: *mut Sequencer, synth: *mut Synth) -> SeqId {
    if synth.is_null() {
        return FLUID_FAILED as SeqId;
    }
    let mut state = FakeSequencer::of(seq).state.lock().unwrap();
    let id = state.next_id;
    state.next_id += 1;
    state.clients.push(Client {
        id,
        name: c"fluidsynth".to_owned(),
        callback: None,
    });
    id
}

// ═══════════════════════════════════════════════════════════════════════════
// File Probes
// ═══════════════════════════════════════════════════════════════════════════

fn header(filename: *const c_char, len: usize) -> Option<Vec<u8>> {
    if filename.is_null() {
        return None;
    }
    let path = unsafe { text(filename) };
    let mut bytes = vec![0u8; len];
    File::open(path).ok()?.read_exact(&mut bytes).ok()?;
    Some(bytes)
}

pub(crate) unsafe extern "C" fn fluid_is_soundfont(filename: *const c_char) -> c_int {
    header(filename, 12).is_some_and(|h| &h[0..4] == b"RIFF" && &h[8..12] == b"sfbk") as c_int
}

pub(crate) unsafe extern "C" fn fluid_is_midifile(filename: *const c_char) -> c_int {
    header(filename, 4).is_some_and(|h| h == b"MThd") as c_int
}
