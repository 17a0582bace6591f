//! Codec - type registry and serialization context
//!
//! The registry maps a [`TypeName`] to the serializer responsible for it and a
//! stable numeric id used in tagged streams. Once setup has run, the registry
//! is frozen into a [`Codec`], which is the context every serializer receives
//! so it can write nested values through the same registry.

use crate::error::{LiveError, LiveResult};
use crate::io::{Input, Output};
use crate::value::{TypeName, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// A serializer for one registered type.
///
/// Implementations are shared across worker threads through the frozen
/// [`Codec`], hence `Send + Sync`.
pub trait Serializer: Send + Sync + fmt::Debug {
    fn write(&self, codec: &Codec, output: &mut Output, value: &Value) -> LiveResult<()>;

    fn read(&self, codec: &Codec, input: &mut Input, type_name: &TypeName) -> LiveResult<Value>;
}

/// Hook run once during codec setup to install serializers.
pub trait CodecRegistrator {
    fn register_types(&self, registry: &mut CodecRegistry) -> LiveResult<()>;
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub id: u32,
    pub type_name: TypeName,
    pub serializer: Arc<dyn Serializer>,
}

/// Mutable type table populated during setup.
#[derive(Debug, Default)]
pub struct CodecRegistry {
    by_name: HashMap<TypeName, Registration>,
    /// Index is the registration id
    by_id: Vec<TypeName>,
}

impl CodecRegistry {
    /// An empty registry; not even the built-in kinds are serializable.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with serializers for every built-in value kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let builtin: Arc<dyn Serializer> = Arc::new(BuiltinSerializer);
        for name in TypeName::BUILTIN {
            registry.register(name, builtin.clone());
        }
        registry
    }

    /// Bind `type_name` to `serializer` and return its id. Re-registering a
    /// type swaps the serializer but keeps the id already on the wire.
    pub fn register(
        &mut self,
        type_name: impl Into<TypeName>,
        serializer: Arc<dyn Serializer>,
    ) -> u32 {
        let type_name = type_name.into();
        if let Some(existing) = self.by_name.get_mut(&type_name) {
            debug!(type_name = %type_name, id = existing.id, "replacing serializer");
            existing.serializer = serializer;
            return existing.id;
        }
        let id = self.by_id.len() as u32;
        debug!(type_name = %type_name, id, "registering serializer");
        self.by_id.push(type_name.clone());
        self.by_name.insert(
            type_name.clone(),
            Registration {
                id,
                type_name,
                serializer,
            },
        );
        id
    }

    pub fn get(&self, type_name: &TypeName) -> Option<&Registration> {
        self.by_name.get(type_name)
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Registration> {
        self.by_id
            .get(id as usize)
            .and_then(|name| self.by_name.get(name))
    }

    pub fn contains(&self, type_name: &TypeName) -> bool {
        self.by_name.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Registrations in id order.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.by_id.iter().filter_map(|name| self.by_name.get(name))
    }
}

/// Frozen registry shared by all serializers of a worker.
#[derive(Debug, Clone)]
pub struct Codec {
    registry: Arc<CodecRegistry>,
}

impl Codec {
    pub fn new(registry: CodecRegistry) -> Self {
        Codec {
            registry: Arc::new(registry),
        }
    }

    /// Run setup: start from the built-in serializers, let `registrator`
    /// install the rest, then freeze.
    pub fn configure(registrator: &dyn CodecRegistrator) -> LiveResult<Self> {
        let mut registry = CodecRegistry::with_defaults();
        registrator.register_types(&mut registry)?;
        info!(types = registry.len(), "codec configured");
        Ok(Codec::new(registry))
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    fn registration(&self, type_name: &TypeName) -> LiveResult<&Registration> {
        self.registry
            .get(type_name)
            .ok_or_else(|| LiveError::UnregisteredType(type_name.to_string()))
    }

    /// Write `value` with the serializer registered for its type; no tag.
    pub fn write_object(&self, output: &mut Output, value: &Value) -> LiveResult<()> {
        let registration = self.registration(&value.type_name())?;
        registration.serializer.write(self, output, value)
    }

    /// Read a value the caller knows to be of `type_name`.
    pub fn read_object(&self, input: &mut Input, type_name: &TypeName) -> LiveResult<Value> {
        let registration = self.registration(type_name)?;
        self.nested(input, |input| {
            registration.serializer.read(self, input, type_name)
        })
    }

    /// Write the type id followed by the value.
    pub fn write_tagged(&self, output: &mut Output, value: &Value) -> LiveResult<()> {
        let registration = self.registration(&value.type_name())?;
        output.write_varint(u64::from(registration.id));
        registration.serializer.write(self, output, value)
    }

    pub fn read_tagged(&self, input: &mut Input) -> LiveResult<Value> {
        let raw = input.read_varint()?;
        let id = u32::try_from(raw)
            .map_err(|_| LiveError::InvalidData(format!("type id {} out of range", raw)))?;
        let registration = self
            .registry
            .get_by_id(id)
            .ok_or(LiveError::UnknownTypeId(id))?;
        self.nested(input, |input| {
            registration
                .serializer
                .read(self, input, &registration.type_name)
        })
    }

    /// Run one serializer read a level deeper; see [`crate::io::MAX_DEPTH`].
    fn nested<F>(&self, input: &mut Input, read: F) -> LiveResult<Value>
    where
        F: FnOnce(&mut Input) -> LiveResult<Value>,
    {
        input.descend()?;
        let result = read(input);
        input.ascend();
        result
    }

    pub fn serialize(&self, value: &Value) -> LiveResult<Vec<u8>> {
        let mut output = Output::new();
        self.write_tagged(&mut output, value)?;
        Ok(output.into_bytes())
    }

    pub fn deserialize(&self, bytes: &[u8]) -> LiveResult<Value> {
        let mut input = Input::new(bytes);
        let value = self.read_tagged(&mut input)?;
        if !input.is_exhausted() {
            return Err(LiveError::InvalidData(format!(
                "{} trailing byte(s) after value",
                input.remaining()
            )));
        }
        Ok(value)
    }
}

/// Serializer for the built-in value kinds. Collections write their
/// elements tagged so they may hold any registered type.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSerializer;

impl Serializer for BuiltinSerializer {
    fn write(&self, codec: &Codec, output: &mut Output, value: &Value) -> LiveResult<()> {
        match value {
            Value::Nil => {}
            Value::Bool(b) => output.write_bool(*b),
            Value::Int(i) => output.write_i64(*i),
            Value::Float(f) => output.write_f64(*f),
            Value::String(s) | Value::Keyword(s) => output.write_str(s),
            Value::Vector(items) => {
                output.write_varint(items.len() as u64);
                for item in items {
                    codec.write_tagged(output, item)?;
                }
            }
            Value::Map(entries) => {
                output.write_varint(entries.len() as u64);
                for (key, value) in entries {
                    codec.write_tagged(output, key)?;
                    codec.write_tagged(output, value)?;
                }
            }
            Value::Record(record) => {
                return Err(LiveError::UnregisteredType(record.type_name().to_string()))
            }
        }
        Ok(())
    }

    fn read(&self, codec: &Codec, input: &mut Input, type_name: &TypeName) -> LiveResult<Value> {
        let value = match type_name.as_str() {
            TypeName::NIL => Value::Nil,
            TypeName::BOOL => Value::Bool(input.read_bool()?),
            TypeName::INT => Value::Int(input.read_i64()?),
            TypeName::FLOAT => Value::Float(input.read_f64()?),
            TypeName::STRING => Value::String(input.read_string()?),
            TypeName::KEYWORD => Value::Keyword(input.read_string()?),
            TypeName::VECTOR => {
                let len = input.read_len()?;
                let mut items = Vec::with_capacity(len.min(input.remaining()));
                for _ in 0..len {
                    items.push(codec.read_tagged(input)?);
                }
                Value::Vector(items)
            }
            TypeName::MAP => {
                let len = input.read_len()?;
                let mut entries = Vec::with_capacity(len.min(input.remaining()));
                for _ in 0..len {
                    let key = codec.read_tagged(input)?;
                    let value = codec.read_tagged(input)?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            other => return Err(LiveError::UnregisteredType(other.to_string())),
        };
        Ok(value)
    }
}
