use std::fmt;

use crate::collection::Collection;
use crate::error::{ParameterError, Result};

/// A single alternative bound to a key.
///
/// Integers, reals, booleans and enum tokens are concrete. Strings may carry
/// `{key}` interpolation markers and references name another key; both are
/// resolved against a [`Collection`] by [`Value::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    String(String),
    /// An enum token, stored without its leading `#`.
    EnumToken(String),
    /// The name of another key, resolved at evaluation time.
    Reference(String),
}

/// The discriminant of a [`Value`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Real,
    Boolean,
    String,
    EnumToken,
    Reference,
}

impl ValueKind {
    pub const fn name(&self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Real => "real",
            ValueKind::Boolean => "boolean",
            ValueKind::String => "string",
            ValueKind::EnumToken => "enum",
            ValueKind::Reference => "reference",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Real(_) => ValueKind::Real,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::String(_) => ValueKind::String,
            Value::EnumToken(_) => ValueKind::EnumToken,
            Value::Reference(_) => ValueKind::Reference,
        }
    }

    /// True for values that need no further evaluation.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Value::String(_) | Value::Reference(_))
    }

    /// Render the value the way it is written in a configuration file.
    pub fn print(&self) -> String {
        self.to_string()
    }

    /// Resolve references and string interpolation against the current
    /// selection of `collection`, returning a fresh value.
    pub fn evaluate(&self, collection: &Collection) -> Result<Value> {
        Evaluator::new(collection).evaluate(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            // Debug keeps a `.0` or an exponent so the text lexes as a real.
            Value::Real(x) => write!(f, "{:?}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::EnumToken(name) => write!(f, "#{}", name),
            Value::Reference(key) => f.write_str(key),
        }
    }
}

/// Evaluate the value currently selected for `key`.
pub(crate) fn evaluate_key(collection: &Collection, key: &str) -> Result<Value> {
    Evaluator::new(collection).evaluate_key(key)
}

/// Walks references and interpolations, remembering which keys are being
/// resolved so that cycles surface as errors.
struct Evaluator<'c> {
    collection: &'c Collection,
    active: Vec<String>,
}

impl<'c> Evaluator<'c> {
    fn new(collection: &'c Collection) -> Self {
        Evaluator {
            collection,
            active: Vec::new(),
        }
    }

    fn evaluate(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Integer(_) | Value::Real(_) | Value::Boolean(_) | Value::EnumToken(_) => {
                Ok(value.clone())
            }
            Value::Reference(key) => self.evaluate_key(key),
            Value::String(text) => self.interpolate(text).map(Value::String),
        }
    }

    fn evaluate_key(&mut self, key: &str) -> Result<Value> {
        if self.active.iter().any(|k| k == key) {
            let mut chain = self.active.clone();
            chain.push(key.to_string());
            return Err(ParameterError::CyclicReference { chain });
        }
        let collection = self.collection;
        let raw = collection.get_basic_value(key)?;
        self.active.push(key.to_string());
        let result = self.evaluate(raw);
        self.active.pop();
        result
    }

    /// Splice `{key}` markers. Only a brace that brings the depth back to
    /// zero closes a marker; inner braces become part of the key name. A
    /// stray `}` is dropped, and so is everything after an unclosed `{`.
    fn interpolate(&mut self, text: &str) -> Result<String> {
        let mut result = String::with_capacity(text.len());
        let mut name = String::new();
        let mut depth = 0usize;

        for ch in text.chars() {
            match ch {
                '{' => {
                    if depth > 0 {
                        name.push(ch);
                    }
                    depth += 1;
                }
                '}' if depth == 0 => {}
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let value = self.evaluate_key(&name)?;
                        result.push_str(&value.print());
                        name.clear();
                    } else {
                        name.push(ch);
                    }
                }
                _ if depth > 0 => name.push(ch),
                _ => result.push(ch),
            }
        }

        Ok(result)
    }
}

/// Conversion from an evaluated [`Value`] into a Rust type.
pub trait FromValue: Sized {
    const KIND: ValueKind;

    /// Returns `None` when the variant does not match [`Self::KIND`].
    fn from_value(value: Value) -> Option<Self>;
}

impl FromValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(n),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const KIND: ValueKind = ValueKind::Real;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Real(x) => Some(x),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }
}

impl FromValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MultiValue;
    use rstest::rstest;

    fn define(collection: &mut Collection, key: &str, values: Vec<Value>) {
        let axis = collection.add_axis(values.len());
        collection
            .set_key_value(key, MultiValue::new(axis, values))
            .unwrap();
    }

    #[rstest]
    #[case(Value::Integer(-42), "-42")]
    #[case(Value::Real(1.0), "1.0")]
    #[case(Value::Real(0.25), "0.25")]
    #[case(Value::Real(1e20), "1e20")]
    #[case(Value::Boolean(true), "true")]
    #[case(Value::Boolean(false), "false")]
    #[case(Value::String("hi".to_string()), "\"hi\"")]
    #[case(Value::EnumToken("neumann".to_string()), "#neumann")]
    #[case(Value::Reference("width".to_string()), "width")]
    fn prints_values(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.print(), expected);
    }

    #[test]
    fn concrete_values_evaluate_to_themselves() {
        let collection = Collection::new();
        for value in [
            Value::Integer(3),
            Value::Real(2.5),
            Value::Boolean(false),
            Value::EnumToken("robin".to_string()),
        ] {
            assert!(value.is_concrete());
            assert_eq!(value.evaluate(&collection).unwrap(), value);
        }
    }

    #[test]
    fn references_chain() {
        let mut collection = Collection::new();
        define(&mut collection, "a", vec![Value::Integer(5)]);
        define(&mut collection, "b", vec![Value::Reference("a".to_string())]);
        define(&mut collection, "c", vec![Value::Reference("b".to_string())]);

        let value = Value::Reference("c".to_string());
        assert_eq!(value.evaluate(&collection).unwrap(), Value::Integer(5));
    }

    #[test]
    fn missing_reference_suggests_a_key() {
        let mut collection = Collection::new();
        define(&mut collection, "width", vec![Value::Integer(5)]);

        let err = Value::Reference("widht".to_string())
            .evaluate(&collection)
            .unwrap_err();
        match err {
            ParameterError::KeyNotFound { key, suggestion } => {
                assert_eq!(key, "widht");
                assert_eq!(suggestion.as_deref(), Some("width"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[rstest]
    #[case("val:{a}", "val:5")]
    #[case("{a}{a}", "55")]
    #[case("no markers", "no markers")]
    #[case("stray } brace", "stray  brace")]
    #[case("tail {a", "tail ")]
    #[case("name is {s}", "name is \"text\"")]
    #[case("enum {e}", "enum #robin")]
    fn interpolates_strings(#[case] text: &str, #[case] expected: &str) {
        let mut collection = Collection::new();
        define(&mut collection, "a", vec![Value::Integer(5)]);
        define(&mut collection, "s", vec![Value::String("text".to_string())]);
        define(&mut collection, "e", vec![Value::EnumToken("robin".to_string())]);

        let value = Value::String(text.to_string()).evaluate(&collection).unwrap();
        assert_eq!(value, Value::String(expected.to_string()));
    }

    #[test]
    fn nested_braces_form_one_key_name() {
        let mut collection = Collection::new();
        define(&mut collection, "a{b}", vec![Value::Integer(1)]);
        define(&mut collection, "b", vec![Value::Integer(2)]);

        let value = Value::String("x{a{b}}y".to_string())
            .evaluate(&collection)
            .unwrap();
        assert_eq!(value, Value::String("x1y".to_string()));
    }

    #[test]
    fn interpolation_evaluates_nested_strings() {
        let mut collection = Collection::new();
        define(&mut collection, "n", vec![Value::Integer(8)]);
        define(&mut collection, "inner", vec![Value::String("n={n}".to_string())]);

        let value = Value::String("[{inner}]".to_string())
            .evaluate(&collection)
            .unwrap();
        assert_eq!(value, Value::String("[\"n=8\"]".to_string()));
    }

    #[test]
    fn detects_reference_cycles() {
        let mut collection = Collection::new();
        define(&mut collection, "a", vec![Value::Reference("b".to_string())]);
        define(&mut collection, "b", vec![Value::Reference("a".to_string())]);

        let err = evaluate_key(&collection, "a").unwrap_err();
        match err {
            ParameterError::CyclicReference { chain } => assert_eq!(chain, ["a", "b", "a"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn detects_self_interpolation() {
        let mut collection = Collection::new();
        define(&mut collection, "s", vec![Value::String("again {s}".to_string())]);

        assert!(matches!(
            evaluate_key(&collection, "s"),
            Err(ParameterError::CyclicReference { .. })
        ));
    }

    #[test]
    fn from_value_requires_matching_variant() {
        assert_eq!(i64::from_value(Value::Integer(3)), Some(3));
        assert_eq!(f64::from_value(Value::Integer(3)), None);
        assert_eq!(bool::from_value(Value::Boolean(true)), Some(true));
        assert_eq!(
            String::from_value(Value::String("x".to_string())),
            Some("x".to_string())
        );
        assert_eq!(String::from_value(Value::EnumToken("x".to_string())), None);
    }
}
