//! The built-in helper namespace, `livecodec.codec`.
//!
//! Provides the generic encode/decode helpers session serializers build on
//! and the default registration routine. Every root loader carries its source;
//! the registrar requires it before anything else.

use crate::bridge::SerializerBridge;
use crate::codec::CodecRegistry;
use crate::error::{LiveError, LiveResult};
use crate::loader::Loader;
use crate::namespace::{Namespace, NamespaceSource, Var};
use crate::symbol::QualifiedSymbol;
use crate::value::{Record, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub const HELPER_NAMESPACE: &str = "livecodec.codec";

pub const WRITE_VALUE: &str = "write-value";
pub const READ_VALUE: &str = "read-value";
pub const WRITE_RECORD: &str = "write-record";
pub const READ_RECORD: &str = "read-record";
pub const CUSTOMIZER: &str = "customizer";

pub(crate) fn sources() -> HashMap<String, NamespaceSource> {
    let source: NamespaceSource = Arc::new(|_: &Loader, ns: &Namespace| define_helpers(ns));
    HashMap::from([(HELPER_NAMESPACE.to_string(), source)])
}

pub fn helper(name: &str) -> LiveResult<QualifiedSymbol> {
    QualifiedSymbol::new(HELPER_NAMESPACE, name)
}

fn define_helpers(ns: &Namespace) -> LiveResult<()> {
    // Any value, prefixed with its type id.
    ns.define(
        WRITE_VALUE,
        Var::encoder(|_, codec, output, value| codec.write_tagged(output, value)),
    )?;
    ns.define(
        READ_VALUE,
        Var::decoder(|_, codec, input, _| codec.read_tagged(input)),
    )?;

    // Records: field count, then (name, tagged value) per field.
    ns.define(
        WRITE_RECORD,
        Var::encoder(|_, codec, output, value| {
            let Value::Record(record) = value else {
                return Err(LiveError::type_mismatch("record", value.type_name().as_str()));
            };
            output.write_varint(record.fields().len() as u64);
            for (name, field) in record.fields() {
                output.write_str(name);
                codec.write_tagged(output, field)?;
            }
            Ok(())
        }),
    )?;
    ns.define(
        READ_RECORD,
        Var::decoder(|_, codec, input, type_name| {
            let count = input.read_len()?;
            let mut record = Record::new(type_name.clone());
            for _ in 0..count {
                let name = input.read_string()?;
                let field = codec.read_tagged(input)?;
                record.set(name, field);
            }
            Ok(Value::Record(record))
        }),
    )?;

    ns.define(CUSTOMIZER, Var::registration(register_record_types))
}

/// Default registration routine: one bridge per declared record type, bound
/// to the record helpers as currently defined.
fn register_record_types(loader: &Loader, registry: &mut CodecRegistry) -> LiveResult<()> {
    let decode = helper(READ_RECORD)?;
    let encode = helper(WRITE_RECORD)?;
    for record_type in loader.record_types()? {
        let bridge = SerializerBridge::resolve(loader, &decode, &encode)?;
        let id = registry.register(record_type.name(), Arc::new(bridge));
        info!(type_name = %record_type.name(), id, "record type registered");
    }
    Ok(())
}
