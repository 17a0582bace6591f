//! Dynamic values exchanged by session code.
//!
//! Types defined interactively exist at runtime as [`Record`]s tagged with a
//! [`TypeName`]. Typed accessors are where a value is checked against what the
//! caller expects, so a decoder that returned the wrong shape is noticed on
//! first use rather than inside the codec.

use crate::error::{LiveError, LiveResult};
use std::fmt;

/// Key of the codec registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(String);

impl TypeName {
    pub const NIL: &'static str = "nil";
    pub const BOOL: &'static str = "bool";
    pub const INT: &'static str = "int";
    pub const FLOAT: &'static str = "float";
    pub const STRING: &'static str = "string";
    pub const KEYWORD: &'static str = "keyword";
    pub const VECTOR: &'static str = "vector";
    pub const MAP: &'static str = "map";

    /// Names reserved for the built-in value kinds, in registration order.
    pub const BUILTIN: [&'static str; 8] = [
        Self::NIL,
        Self::BOOL,
        Self::INT,
        Self::FLOAT,
        Self::STRING,
        Self::KEYWORD,
        Self::VECTOR,
        Self::MAP,
    ];

    pub fn new(name: impl Into<String>) -> Self {
        TypeName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_builtin(&self) -> bool {
        Self::BUILTIN.contains(&self.0.as_str())
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        TypeName::new(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Keyword(String),
    Vector(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Record(Record),
}

impl Value {
    pub fn type_name(&self) -> TypeName {
        match self {
            Value::Nil => TypeName::new(TypeName::NIL),
            Value::Bool(_) => TypeName::new(TypeName::BOOL),
            Value::Int(_) => TypeName::new(TypeName::INT),
            Value::Float(_) => TypeName::new(TypeName::FLOAT),
            Value::String(_) => TypeName::new(TypeName::STRING),
            Value::Keyword(_) => TypeName::new(TypeName::KEYWORD),
            Value::Vector(_) => TypeName::new(TypeName::VECTOR),
            Value::Map(_) => TypeName::new(TypeName::MAP),
            Value::Record(record) => record.type_name().clone(),
        }
    }

    pub fn as_int(&self) -> LiveResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(LiveError::type_mismatch(TypeName::INT, other.type_name().0)),
        }
    }

    /// Borrow this value as a record of the given type.
    pub fn as_record_of(&self, expected: &TypeName) -> LiveResult<&Record> {
        match self {
            Value::Record(record) if record.type_name() == expected => Ok(record),
            other => Err(LiveError::type_mismatch(
                expected.as_str(),
                other.type_name().0,
            )),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

/// An instance of a session-defined type. Field order is significant.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: TypeName,
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<TypeName>) -> Self {
        Record {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing one in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_int(&self, name: &str) -> LiveResult<i64> {
        self.field(name)
            .ok_or_else(|| {
                LiveError::type_mismatch(
                    format!("{} with field '{}'", self.type_name, name),
                    self.type_name.as_str(),
                )
            })?
            .as_int()
    }
}

/// A type declared by session code: a name plus its field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    name: TypeName,
    fields: Vec<String>,
}

impl RecordType {
    pub fn new<I, S>(name: impl Into<TypeName>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RecordType {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Build a record from positional field values.
    pub fn instantiate(&self, values: Vec<Value>) -> LiveResult<Value> {
        if values.len() != self.fields.len() {
            return Err(LiveError::InvalidData(format!(
                "{} takes {} field(s), got {}",
                self.name,
                self.fields.len(),
                values.len()
            )));
        }
        let mut record = Record::new(self.name.clone());
        for (field, value) in self.fields.iter().zip(values) {
            record.set(field.clone(), value);
        }
        Ok(Value::Record(record))
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        TypeName(name)
    }
}

impl From<&TypeName> for TypeName {
    fn from(name: &TypeName) -> Self {
        name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> RecordType {
        RecordType::new("Point", ["x", "y"])
    }

    #[test]
    fn test_instantiate_checks_arity() {
        let p = point()
            .instantiate(vec![Value::Int(3), Value::Int(4)])
            .unwrap();
        let record = p.as_record_of(&"Point".into()).unwrap();
        assert_eq!(record.get_int("x").unwrap(), 3);
        assert_eq!(record.get_int("y").unwrap(), 4);

        assert!(matches!(
            point().instantiate(vec![Value::Int(3)]),
            Err(LiveError::InvalidData(_))
        ));
    }

    #[test]
    fn test_typed_access_reports_mismatch() {
        let v = Value::String("not a point".into());
        assert_eq!(
            v.as_record_of(&"Point".into()),
            Err(LiveError::type_mismatch("Point", "string"))
        );
        assert_eq!(
            Value::Nil.as_int(),
            Err(LiveError::type_mismatch("int", "nil"))
        );

        let other = Value::Record(Record::new("Circle").with_field("r", 2));
        assert!(other.as_record_of(&"Point".into()).is_err());
    }

    #[test]
    fn test_set_replaces_existing_field() {
        let mut r = Record::new("Point").with_field("x", 1).with_field("y", 2);
        r.set("x", 10);
        assert_eq!(r.fields().len(), 2);
        assert_eq!(r.get_int("x").unwrap(), 10);
        assert!(r.get_int("z").is_err());
    }

    #[test]
    fn test_builtin_type_names() {
        assert!(Value::Vector(vec![]).type_name().is_builtin());
        assert!(!TypeName::new("Point").is_builtin());
        assert_eq!(Value::Float(1.5).type_name().as_str(), "float");
    }
}
