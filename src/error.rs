// src/error.rs
//
// Errors raised in Lua by the binding layer.
//
// Engine failures are not errors here: they come back to Lua as `nil`
// (see `translate`). What is raised is what the binding itself detects
// before or instead of calling the engine.

use thiserror::Error;

use crate::handle::{HandleKind, HandleState};

#[derive(Debug, Error)]
pub enum BindingError {
    /// Wrong host value kind at the boundary; no native call was made.
    #[error("bad argument #{index} to '{function}' ({expected} expected, got {found})")]
    ArgumentType {
        function: &'static str,
        index: usize,
        expected: String,
        found: String,
    },

    /// A handle whose native object is gone, or no longer ours to use.
    #[error("bad argument #{index} to '{function}' ({kind} handle is {state})")]
    UseAfterFree {
        function: &'static str,
        index: usize,
        kind: HandleKind,
        state: HandleState,
    },

    /// A blocking call made from inside a sequencer callback.
    #[error("'{function}' blocks and cannot be called from a sequencer callback")]
    Reentrant { function: &'static str },

    #[error("engine library not found (tried {tried})")]
    EngineUnavailable { tried: String },

    #[error("engine library has no symbol '{symbol}'")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
}

impl From<BindingError> for mlua::Error {
    fn from(err: BindingError) -> Self {
        mlua::Error::external(err)
    }
}
