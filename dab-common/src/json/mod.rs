//! The DAB JSON value model.
//!
//! [`Value`] is the sole interchange type of the bridge runtime: request
//! envelopes, handler replies, and telemetry samples are all `Value`
//! trees. Parsing accepts a relaxed superset of JSON (see [`parse`]) and
//! serialization produces the compact byte-compatible form DAB operators
//! expect (see [`Value::serialize`]).

mod parse;
mod ser;
mod value;

pub use parse::parse;
pub use value::Value;
