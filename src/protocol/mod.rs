//! Wire envelopes exchanged with callers.
//!
//! Requests arrive as `{pattern, data, id}` and every request gets exactly one
//! `{success, message, data}` reply. `success` is the string `"success"` or
//! `"error"`.

pub mod envelope;

pub use envelope::*;
