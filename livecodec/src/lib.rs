//! livecodec - late-bound serializers for live cluster sessions
//!
//! Worker processes install their serializers by *name*: a configured
//! registration routine is resolved against the session's loader when the
//! codec is set up, and each session-defined type is backed by a
//! [`SerializerBridge`] forwarding to callables resolved the same way. New
//! code reaches already-running workers through the [`Instrumentation`]
//! handle captured by the [`Agent`].

pub mod agent;
pub mod bridge;
pub mod builtin;
pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod loader;
pub mod namespace;
pub mod registrar;
pub mod symbol;
pub mod value;
pub mod worker;

pub use agent::{Agent, Instrumentation};
pub use bridge::SerializerBridge;
pub use codec::{Codec, CodecRegistrator, CodecRegistry, Serializer};
pub use config::WorkerConf;
pub use error::{LiveError, LiveResult};
pub use io::{Input, Output};
pub use loader::Loader;
pub use namespace::{DecodeFn, EncodeFn, Namespace, RegistrationFn, Var};
pub use registrar::{Registrar, CUSTOMIZER_KEY, DEFAULT_CUSTOMIZER};
pub use symbol::QualifiedSymbol;
pub use value::{Record, RecordType, TypeName, Value};
pub use worker::WorkerEnv;
