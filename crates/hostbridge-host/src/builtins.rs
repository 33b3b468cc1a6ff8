//! Builtin classes for the engine's primitive types.
//!
//! Registered under the engine's own names so policies can write
//! `x matches Integer` or call `s.starts_with("a")` on plain strings.

use std::collections::BTreeMap;

use crate::class::{Arity, Class};
use crate::value::{arg, HostValue};

fn len(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub fn classes() -> Vec<Class> {
    vec![
        Class::builder::<bool>()
            .name("Boolean")
            .with_equality_check()
            .build(),
        Class::builder::<i64>()
            .name("Integer")
            .with_equality_check()
            .with_ordering()
            .add_method("abs", Arity::Fixed(0), |i: &i64, _| Ok(i.saturating_abs()))
            .build(),
        Class::builder::<f64>()
            .name("Float")
            .with_equality_check()
            .with_ordering()
            .add_method("abs", Arity::Fixed(0), |f: &f64, _| Ok(f.abs()))
            .build(),
        Class::builder::<String>()
            .name("String")
            .with_equality_check()
            .with_ordering()
            .add_method("len", Arity::Fixed(0), |s: &String, _| Ok(len(s.chars().count())))
            .add_method("to_lowercase", Arity::Fixed(0), |s: &String, _| {
                Ok(s.to_lowercase())
            })
            .add_method("to_uppercase", Arity::Fixed(0), |s: &String, _| {
                Ok(s.to_uppercase())
            })
            .add_method("starts_with", Arity::Fixed(1), |s: &String, args| {
                Ok(s.starts_with(arg::<String>(&args, 0)?.as_str()))
            })
            .add_method("ends_with", Arity::Fixed(1), |s: &String, args| {
                Ok(s.ends_with(arg::<String>(&args, 0)?.as_str()))
            })
            .add_method("contains", Arity::Fixed(1), |s: &String, args| {
                Ok(s.contains(arg::<String>(&args, 0)?.as_str()))
            })
            .build(),
        Class::builder::<Vec<HostValue>>()
            .name("List")
            .with_equality_check()
            .with_iter(|items: &Vec<HostValue>| items.clone())
            .add_method("len", Arity::Fixed(0), |items: &Vec<HostValue>, _| {
                Ok(len(items.len()))
            })
            .add_method("contains", Arity::Fixed(1), |items: &Vec<HostValue>, args| {
                let needle = arg::<HostValue>(&args, 0)?;
                Ok(items.contains(&needle))
            })
            .build(),
        Class::builder::<BTreeMap<String, HostValue>>()
            .name("Dictionary")
            .with_equality_check()
            .add_method(
                "len",
                Arity::Fixed(0),
                |fields: &BTreeMap<String, HostValue>, _| Ok(len(fields.len())),
            )
            .add_method(
                "keys",
                Arity::Fixed(0),
                |fields: &BTreeMap<String, HostValue>, _| {
                    Ok(fields.keys().cloned().collect::<Vec<String>>())
                },
            )
            .build(),
    ]
}
