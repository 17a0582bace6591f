//! Serializer bridge
//!
//! One compiled serializer shape that can stand in for any session-defined
//! type. The bridge owns nothing but a decode and an encode callable and
//! forwards every call to them verbatim, passing itself along so the callable
//! can recurse through the same contract for nested values.
//!
//! The bridge does not check what the decoder returns against the requested
//! type. A decoder that produces the wrong shape is caught by the first typed
//! access on the value (see [`Value::as_record_of`]).

use crate::codec::{Codec, Serializer};
use crate::error::LiveResult;
use crate::io::{Input, Output};
use crate::loader::Loader;
use crate::namespace::{DecodeFn, EncodeFn};
use crate::symbol::QualifiedSymbol;
use crate::value::{TypeName, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct SerializerBridge {
    decode: DecodeFn,
    encode: EncodeFn,
}

impl SerializerBridge {
    pub fn new(decode: DecodeFn, encode: EncodeFn) -> Self {
        SerializerBridge { decode, encode }
    }

    pub fn from_fns<D, E>(decode: D, encode: E) -> Self
    where
        D: Fn(&SerializerBridge, &Codec, &mut Input, &TypeName) -> LiveResult<Value>
            + Send
            + Sync
            + 'static,
        E: Fn(&SerializerBridge, &Codec, &mut Output, &Value) -> LiveResult<()>
            + Send
            + Sync
            + 'static,
    {
        SerializerBridge::new(Arc::new(decode), Arc::new(encode))
    }

    /// Build a bridge from the current bindings of two symbols.
    pub fn resolve(
        loader: &Loader,
        decode: &QualifiedSymbol,
        encode: &QualifiedSymbol,
    ) -> LiveResult<Self> {
        debug!(loader = loader.name(), %decode, %encode, "resolving bridge callables");
        Ok(SerializerBridge {
            decode: loader.resolve_decoder(decode)?,
            encode: loader.resolve_encoder(encode)?,
        })
    }
}

impl Serializer for SerializerBridge {
    fn write(&self, codec: &Codec, output: &mut Output, value: &Value) -> LiveResult<()> {
        (self.encode)(self, codec, output, value)
    }

    fn read(&self, codec: &Codec, input: &mut Input, type_name: &TypeName) -> LiveResult<Value> {
        (self.decode)(self, codec, input, type_name)
    }
}

impl fmt::Debug for SerializerBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SerializerBridge")
    }
}
