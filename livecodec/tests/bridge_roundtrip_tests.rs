use livecodec::{
    Codec, CodecRegistrator, CodecRegistry, Input, LiveError, LiveResult, Loader, Output,
    QualifiedSymbol, Record, Registrar, Serializer, SerializerBridge, TypeName, Value, Var,
    WorkerConf, CUSTOMIZER_KEY,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

fn point(x: i64, y: i64) -> Value {
    Value::Record(Record::new("Point").with_field("x", x).with_field("y", y))
}

/// A session that defines `Point`, `Segment` (two points, written through
/// the codec) and `Chain` (a linked list, written by recursing through the
/// bridge it was handed).
fn geometry_session() -> Arc<Loader> {
    let loader = Loader::new_root("geometry");
    loader
        .provide("geo", |_, ns| {
            ns.define(
                "write-point",
                Var::encoder(|_, _, output, value| {
                    let p = value.as_record_of(&TypeName::new("Point"))?;
                    output.write_i64(p.get_int("x")?);
                    output.write_i64(p.get_int("y")?);
                    Ok(())
                }),
            )?;
            ns.define(
                "read-point",
                Var::decoder(|_, _, input, type_name| {
                    let x = input.read_i64()?;
                    let y = input.read_i64()?;
                    Ok(Value::Record(
                        Record::new(type_name.clone())
                            .with_field("x", x)
                            .with_field("y", y),
                    ))
                }),
            )?;
            ns.define(
                "write-segment",
                Var::encoder(|_, codec, output, value| {
                    let segment = value.as_record_of(&TypeName::new("Segment"))?;
                    for end in ["from", "to"] {
                        let p = segment.field(end).ok_or_else(|| {
                            LiveError::Callback(format!("segment without '{}'", end))
                        })?;
                        codec.write_object(output, p)?;
                    }
                    Ok(())
                }),
            )?;
            ns.define(
                "read-segment",
                Var::decoder(|_, codec, input, type_name| {
                    let point_type = TypeName::new("Point");
                    let from = codec.read_object(input, &point_type)?;
                    let to = codec.read_object(input, &point_type)?;
                    Ok(Value::Record(
                        Record::new(type_name.clone())
                            .with_field("from", from)
                            .with_field("to", to),
                    ))
                }),
            )?;
            ns.define(
                "write-chain",
                Var::encoder(|bridge, codec, output, value| {
                    let link = value.as_record_of(&TypeName::new("Chain"))?;
                    output.write_i64(link.get_int("head")?);
                    match link.field("tail") {
                        Some(tail @ Value::Record(_)) => {
                            output.write_bool(true);
                            bridge.write(codec, output, tail)
                        }
                        _ => {
                            output.write_bool(false);
                            Ok(())
                        }
                    }
                }),
            )?;
            ns.define(
                "read-chain",
                Var::decoder(|bridge, codec, input, type_name| {
                    let head = input.read_i64()?;
                    let tail = if input.read_bool()? {
                        bridge.read(codec, input, type_name)?
                    } else {
                        Value::Nil
                    };
                    Ok(Value::Record(
                        Record::new(type_name.clone())
                            .with_field("head", head)
                            .with_field("tail", tail),
                    ))
                }),
            )?;
            ns.define(
                "install",
                Var::registration(|loader, registry| {
                    for (type_name, stem) in
                        [("Point", "point"), ("Segment", "segment"), ("Chain", "chain")]
                    {
                        let bridge = SerializerBridge::resolve(
                            loader,
                            &QualifiedSymbol::new("geo", format!("read-{}", stem))?,
                            &QualifiedSymbol::new("geo", format!("write-{}", stem))?,
                        )?;
                        registry.register(type_name, Arc::new(bridge));
                    }
                    Ok(())
                }),
            )
        })
        .unwrap();
    loader
}

fn geometry_codec() -> Codec {
    let registrar = Registrar::new(
        geometry_session(),
        WorkerConf::new().with(CUSTOMIZER_KEY, "geo/install"),
    );
    Codec::configure(&registrar).unwrap()
}

fn chain(values: &[i64]) -> Value {
    values.iter().rev().fold(Value::Nil, |tail, head| {
        Value::Record(
            Record::new("Chain")
                .with_field("head", *head)
                .with_field("tail", tail),
        )
    })
}

#[test]
fn point_roundtrips_through_one_channel() {
    let codec = geometry_codec();
    let mut output = Output::new();
    codec.write_object(&mut output, &point(3, 4)).unwrap();
    let mut input = Input::from(output);
    assert_eq!(
        codec.read_object(&mut input, &"Point".into()).unwrap(),
        point(3, 4)
    );
}

#[test]
fn nested_values_go_through_the_codec() {
    let codec = geometry_codec();
    let segment = Value::Record(
        Record::new("Segment")
            .with_field("from", point(0, 0))
            .with_field("to", point(-7, 12)),
    );
    let bytes = codec.serialize(&segment).unwrap();
    assert_eq!(codec.deserialize(&bytes).unwrap(), segment);

    let in_a_vector = Value::Vector(vec![point(1, 1), segment.clone(), Value::Int(5)]);
    let bytes = codec.serialize(&in_a_vector).unwrap();
    assert_eq!(codec.deserialize(&bytes).unwrap(), in_a_vector);
}

#[test]
fn callables_can_recurse_through_their_bridge() {
    let codec = geometry_codec();
    let list = chain(&[1, 2, 3, 4]);
    let bytes = codec.serialize(&list).unwrap();
    assert_eq!(codec.deserialize(&bytes).unwrap(), list);
}

#[test]
fn truncated_input_fails_inside_the_callable() {
    let codec = geometry_codec();
    let mut bytes = codec.serialize(&point(1_000, 2_000)).unwrap();
    bytes.pop();
    assert!(matches!(
        codec.deserialize(&bytes),
        Err(LiveError::BufferUnderflow { .. })
    ));
}

#[test]
fn installed_bridges_are_shared_across_threads() {
    let codec = geometry_codec();
    let handles: Vec<_> = (0..8i64)
        .map(|t| {
            let codec = codec.clone();
            thread::spawn(move || -> LiveResult<()> {
                for i in 0..200i64 {
                    let value = chain(&[t, i, t * i]);
                    let bytes = codec.serialize(&value)?;
                    assert_eq!(codec.deserialize(&bytes)?, value);
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
}

/// A serializer written by hand against the same trait, to show bridges
/// and ordinary serializers mix in one registry.
#[derive(Debug)]
struct Celsius;

impl Serializer for Celsius {
    fn write(&self, _codec: &Codec, output: &mut Output, value: &Value) -> LiveResult<()> {
        let r = value.as_record_of(&TypeName::new("Celsius"))?;
        output.write_i64(r.get_int("degrees")?);
        Ok(())
    }

    fn read(&self, _codec: &Codec, input: &mut Input, type_name: &TypeName) -> LiveResult<Value> {
        Ok(Value::Record(
            Record::new(type_name.clone()).with_field("degrees", input.read_i64()?),
        ))
    }
}

struct WithCelsius(Registrar);

impl CodecRegistrator for WithCelsius {
    fn register_types(&self, registry: &mut CodecRegistry) -> LiveResult<()> {
        registry.register("Celsius", Arc::new(Celsius));
        self.0.register_types(registry)
    }
}

#[test]
fn bridges_and_plain_serializers_share_a_registry() {
    let codec = Codec::configure(&WithCelsius(Registrar::new(
        geometry_session(),
        WorkerConf::new().with(CUSTOMIZER_KEY, "geo/install"),
    )))
    .unwrap();
    let reading = Value::Map(vec![
        (Value::Keyword("at".into()), point(10, 20)),
        (
            Value::Keyword("temp".into()),
            Value::Record(Record::new("Celsius").with_field("degrees", -4)),
        ),
    ]);
    let bytes = codec.serialize(&reading).unwrap();
    assert_eq!(codec.deserialize(&bytes).unwrap(), reading);
}

proptest! {
    #[test]
    fn point_roundtrip_holds_for_any_coordinates(x in any::<i64>(), y in any::<i64>()) {
        let codec = geometry_codec();
        let bytes = codec.serialize(&point(x, y)).unwrap();
        prop_assert_eq!(codec.deserialize(&bytes).unwrap(), point(x, y));
    }

    #[test]
    fn chain_roundtrip_holds_for_any_list(values in prop::collection::vec(any::<i64>(), 1..16)) {
        let codec = geometry_codec();
        let list = chain(&values);
        let bytes = codec.serialize(&list).unwrap();
        prop_assert_eq!(codec.deserialize(&bytes).unwrap(), list);
    }
}
