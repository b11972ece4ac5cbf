//! Structural type mirrors
//!
//! Types are compared structurally: two mirrors are equal when their
//! qualified names and type arguments are equal. This is the equivalence
//! used for [`Key`](crate::Key) identity.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified name of a declared type, e.g. `java.util.Set`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    /// Create a type name from its qualified form
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The qualified name
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name after the last `.`
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// The qualifier before the simple name, if any
    pub fn package(&self) -> &str {
        match self.0.rfind('.') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Whether this name equals the given qualified name
    #[inline]
    pub fn is(&self, qualified: &str) -> bool {
        self.0 == qualified
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Primitive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
}

impl PrimitiveKind {
    /// The keyword spelling
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Char => "char",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// The boxed wrapper class
    pub fn boxed_name(self) -> &'static str {
        match self {
            Self::Boolean => "java.lang.Boolean",
            Self::Byte => "java.lang.Byte",
            Self::Short => "java.lang.Short",
            Self::Int => "java.lang.Integer",
            Self::Long => "java.lang.Long",
            Self::Char => "java.lang.Character",
            Self::Float => "java.lang.Float",
            Self::Double => "java.lang.Double",
        }
    }
}

/// A type as seen by the processor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeMirror {
    Declared {
        name: TypeName,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<TypeMirror>,
    },
    Primitive {
        primitive: PrimitiveKind,
    },
    Array {
        component: Box<TypeMirror>,
    },
    Wildcard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extends: Option<Box<TypeMirror>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        super_bound: Option<Box<TypeMirror>>,
    },
    TypeVariable {
        name: String,
    },
    Void,
    /// A reference to a type that could not be resolved in this round
    Error {
        name: TypeName,
    },
}

impl TypeMirror {
    /// A declared type without arguments
    pub fn named(name: impl Into<String>) -> Self {
        Self::Declared {
            name: TypeName::new(name),
            args: Vec::new(),
        }
    }

    /// A declared type with arguments
    pub fn declared(name: impl Into<String>, args: Vec<TypeMirror>) -> Self {
        Self::Declared {
            name: TypeName::new(name),
            args,
        }
    }

    /// A primitive type
    pub fn primitive(primitive: PrimitiveKind) -> Self {
        Self::Primitive { primitive }
    }

    /// A type variable
    pub fn variable(name: impl Into<String>) -> Self {
        Self::TypeVariable { name: name.into() }
    }

    /// An unbounded wildcard
    pub fn wildcard() -> Self {
        Self::Wildcard {
            extends: None,
            super_bound: None,
        }
    }

    /// A type that failed to resolve
    pub fn error(name: impl Into<String>) -> Self {
        Self::Error {
            name: TypeName::new(name),
        }
    }

    /// The declared name, if this is a declared type
    pub fn declared_name(&self) -> Option<&TypeName> {
        match self {
            Self::Declared { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Type arguments of a declared type
    pub fn type_args(&self) -> &[TypeMirror] {
        match self {
            Self::Declared { args, .. } => args,
            _ => &[],
        }
    }

    /// Whether this is a declared type with the given qualified name
    pub fn is_type_of(&self, qualified: &str) -> bool {
        matches!(self, Self::Declared { name, .. } if name.is(qualified))
    }

    /// The single type argument of a declared type
    pub fn only_type_arg(&self) -> Option<&TypeMirror> {
        match self.type_args() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Whether this is a declared type without arguments
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Declared { args, .. } if args.is_empty())
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive { .. })
    }

    #[inline]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard { .. })
    }

    /// Primitives become their wrapper classes; everything else is unchanged
    pub fn boxed(&self) -> TypeMirror {
        match self {
            Self::Primitive { primitive } => Self::named(primitive.boxed_name()),
            other => other.clone(),
        }
    }

    /// Drops all type arguments
    pub fn erasure(&self) -> TypeMirror {
        match self {
            Self::Declared { name, .. } => Self::Declared {
                name: name.clone(),
                args: Vec::new(),
            },
            Self::Array { component } => Self::Array {
                component: Box::new(component.erasure()),
            },
            Self::TypeVariable { .. } | Self::Wildcard { .. } => Self::named("java.lang.Object"),
            other => other.clone(),
        }
    }

    /// Replaces type variables using the given bindings
    pub fn substitute(&self, bindings: &AHashMap<String, TypeMirror>) -> TypeMirror {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            Self::TypeVariable { name } => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Declared { name, args } => Self::Declared {
                name: name.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Self::Array { component } => Self::Array {
                component: Box::new(component.substitute(bindings)),
            },
            Self::Wildcard {
                extends,
                super_bound,
            } => Self::Wildcard {
                extends: extends.as_ref().map(|t| Box::new(t.substitute(bindings))),
                super_bound: super_bound.as_ref().map(|t| Box::new(t.substitute(bindings))),
            },
            other => other.clone(),
        }
    }

    /// Whether any type variable appears in this type
    pub fn contains_type_variables(&self) -> bool {
        match self {
            Self::TypeVariable { .. } => true,
            Self::Declared { args, .. } => args.iter().any(Self::contains_type_variables),
            Self::Array { component } => component.contains_type_variables(),
            Self::Wildcard {
                extends,
                super_bound,
            } => {
                extends.as_ref().is_some_and(|t| t.contains_type_variables())
                    || super_bound.as_ref().is_some_and(|t| t.contains_type_variables())
            }
            _ => false,
        }
    }

    /// The first unresolved type reachable from this type
    pub fn first_error(&self) -> Option<&TypeName> {
        match self {
            Self::Error { name } => Some(name),
            Self::Declared { args, .. } => args.iter().find_map(Self::first_error),
            Self::Array { component } => component.first_error(),
            Self::Wildcard {
                extends,
                super_bound,
            } => extends
                .as_deref()
                .and_then(Self::first_error)
                .or_else(|| super_bound.as_deref().and_then(Self::first_error)),
            _ => None,
        }
    }

    /// Simple name used when deriving member names, e.g. `Set<Foo>` -> `setOfFoo`
    pub fn name_hint(&self) -> String {
        match self {
            Self::Declared { name, args } if args.is_empty() => name.simple_name().to_string(),
            Self::Declared { name, args } => {
                let mut hint = name.simple_name().to_string();
                hint.push_str("Of");
                for arg in args {
                    hint.push_str(&arg.name_hint());
                }
                hint
            }
            Self::Primitive { primitive } => primitive.keyword().to_string(),
            Self::Array { component } => format!("{}Array", component.name_hint()),
            Self::TypeVariable { name } => name.clone(),
            Self::Wildcard { .. } => "Object".to_string(),
            Self::Void => "Void".to_string(),
            Self::Error { name } => name.simple_name().to_string(),
        }
    }
}

impl fmt::Display for TypeMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Self::Primitive { primitive } => f.write_str(primitive.keyword()),
            Self::Array { component } => write!(f, "{}[]", component),
            Self::Wildcard {
                extends,
                super_bound,
            } => {
                f.write_str("?")?;
                if let Some(bound) = extends {
                    write!(f, " extends {}", bound)?;
                }
                if let Some(bound) = super_bound {
                    write!(f, " super {}", bound)?;
                }
                Ok(())
            }
            Self::TypeVariable { name } => f.write_str(name),
            Self::Void => f.write_str("void"),
            Self::Error { name } => write!(f, "{}", name),
        }
    }
}
