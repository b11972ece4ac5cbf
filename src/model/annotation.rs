//! Annotation mirrors
//!
//! Annotations compare structurally (type plus member values), which is the
//! equivalence used for qualifiers in keys and for map keys.

use super::types::{TypeMirror, TypeName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of an annotation member
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Type(TypeMirror),
    Enum { ty: TypeName, constant: String },
    Annotation(Box<Annotation>),
    List(Vec<AnnotationValue>),
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::Type(t) => write!(f, "{}.class", t),
            Self::Enum { ty, constant } => write!(f, "{}.{}", ty, constant),
            Self::Annotation(a) => write!(f, "{}", a),
            Self::List(values) => {
                f.write_str("{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// An annotation applied to an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub annotation_type: TypeName,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, AnnotationValue>,
}

impl Annotation {
    /// An annotation without member values
    pub fn new(annotation_type: impl Into<String>) -> Self {
        Self {
            annotation_type: TypeName::new(annotation_type),
            values: BTreeMap::new(),
        }
    }

    /// Adds a member value
    pub fn with_value(mut self, name: impl Into<String>, value: AnnotationValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Shorthand for `value = "..."`
    pub fn with_str(self, value: impl Into<String>) -> Self {
        self.with_value("value", AnnotationValue::Str(value.into()))
    }

    /// Shorthand for a `Class[]` member such as `modules = {...}`
    pub fn with_types(self, name: impl Into<String>, types: Vec<TypeMirror>) -> Self {
        self.with_value(
            name,
            AnnotationValue::List(types.into_iter().map(AnnotationValue::Type).collect()),
        )
    }

    /// Whether this annotation is of the given type
    #[inline]
    pub fn is(&self, qualified: &str) -> bool {
        self.annotation_type.is(qualified)
    }

    /// Member value by name
    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.get(name)
    }

    /// A `Class[]` (or single `Class`) member as types
    pub fn type_list(&self, name: &str) -> Vec<TypeMirror> {
        match self.values.get(name) {
            Some(AnnotationValue::List(values)) => values
                .iter()
                .filter_map(|v| match v {
                    AnnotationValue::Type(t) => Some(t.clone()),
                    _ => None,
                })
                .collect(),
            Some(AnnotationValue::Type(t)) => vec![t.clone()],
            _ => Vec::new(),
        }
    }

    /// A boolean member, or the given default
    pub fn bool_value(&self, name: &str, default: bool) -> bool {
        match self.values.get(name) {
            Some(AnnotationValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// `@SimpleName`, used in readable messages
    pub fn simple_form(&self) -> String {
        format!("@{}", self.annotation_type.simple_name())
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.annotation_type)?;
        if self.values.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        if self.values.len() == 1 {
            if let Some(v) = self.values.get("value") {
                write!(f, "{}", v)?;
                return f.write_str(")");
            }
        }
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str(")")
    }
}
