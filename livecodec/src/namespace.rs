// Namespaces - named bindings pushed in by session code

use crate::bridge::SerializerBridge;
use crate::codec::{Codec, CodecRegistry};
use crate::error::{poisoned, LiveResult};
use crate::io::{Input, Output};
use crate::loader::Loader;
use crate::value::{RecordType, TypeName, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// A registration routine: installs serializers into a registry under setup.
/// The loader is the one the registrar resolved the routine from, so the
/// routine can resolve bridge callables against the same session.
pub type RegistrationFn =
    Arc<dyn Fn(&Loader, &mut CodecRegistry) -> LiveResult<()> + Send + Sync>;

/// Encode half of a bridge: `(bridge, codec, output, value)`.
pub type EncodeFn =
    Arc<dyn Fn(&SerializerBridge, &Codec, &mut Output, &Value) -> LiveResult<()> + Send + Sync>;

/// Decode half of a bridge: `(bridge, codec, input, requested type)`.
pub type DecodeFn = Arc<
    dyn Fn(&SerializerBridge, &Codec, &mut Input, &TypeName) -> LiveResult<Value> + Send + Sync,
>;

/// Code that populates a namespace when it is first required.
pub type NamespaceSource = Arc<dyn Fn(&Loader, &Namespace) -> LiveResult<()> + Send + Sync>;

/// What a symbol is bound to.
#[derive(Clone)]
pub enum Var {
    Registration(RegistrationFn),
    Encoder(EncodeFn),
    Decoder(DecodeFn),
    Type(RecordType),
    Value(Value),
}

impl Var {
    pub fn registration<F>(f: F) -> Self
    where
        F: Fn(&Loader, &mut CodecRegistry) -> LiveResult<()> + Send + Sync + 'static,
    {
        Var::Registration(Arc::new(f))
    }

    pub fn encoder<F>(f: F) -> Self
    where
        F: Fn(&SerializerBridge, &Codec, &mut Output, &Value) -> LiveResult<()>
            + Send
            + Sync
            + 'static,
    {
        Var::Encoder(Arc::new(f))
    }

    pub fn decoder<F>(f: F) -> Self
    where
        F: Fn(&SerializerBridge, &Codec, &mut Input, &TypeName) -> LiveResult<Value>
            + Send
            + Sync
            + 'static,
    {
        Var::Decoder(Arc::new(f))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Var::Registration(_) => "registration routine",
            Var::Encoder(_) => "encoder",
            Var::Decoder(_) => "decoder",
            Var::Type(_) => "record type",
            Var::Value(_) => "value",
        }
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::Type(record_type) => f.debug_tuple("Type").field(record_type).finish(),
            Var::Value(value) => f.debug_tuple("Value").field(value).finish(),
            callable => write!(f, "#<{}>", callable.kind()),
        }
    }
}

/// A loaded namespace. Bindings can be replaced at any time; resolution
/// always reads the current binding.
#[derive(Debug)]
pub struct Namespace {
    name: String,
    vars: RwLock<HashMap<String, Var>>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Namespace {
            name: name.into(),
            vars: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind `name`, replacing any previous binding.
    pub fn define(&self, name: impl Into<String>, var: Var) -> LiveResult<()> {
        self.vars.write().map_err(poisoned)?.insert(name.into(), var);
        Ok(())
    }

    pub fn get(&self, name: &str) -> LiveResult<Option<Var>> {
        Ok(self.vars.read().map_err(poisoned)?.get(name).cloned())
    }

    pub fn names(&self) -> LiveResult<Vec<String>> {
        let mut names: Vec<String> = self.vars.read().map_err(poisoned)?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn record_types(&self) -> LiveResult<Vec<RecordType>> {
        let vars = self.vars.read().map_err(poisoned)?;
        let mut types: Vec<RecordType> = vars
            .values()
            .filter_map(|var| match var {
                Var::Type(record_type) => Some(record_type.clone()),
                _ => None,
            })
            .collect();
        types.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(types)
    }
}
