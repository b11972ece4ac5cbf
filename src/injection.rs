//! Meta-annotation queries: qualifiers, scopes, map keys and nullability

use crate::framework::names;
use crate::model::{Annotation, AnnotationValue, ProgramModel, TypeMirror};
use crate::scope::Scope;

const WELL_KNOWN_QUALIFIERS: &[&str] = &[names::NAMED, names::PRODUCTION, names::PRODUCTION_IMPLEMENTATION];
const WELL_KNOWN_SCOPES: &[&str] = &[names::SINGLETON, names::REUSABLE, names::PRODUCTION_SCOPE];
const WELL_KNOWN_MAP_KEYS: &[&str] = &[names::STRING_KEY, names::INT_KEY, names::LONG_KEY, names::CLASS_KEY];

/// Classifies annotations by their meta-annotations
#[derive(Clone, Copy)]
pub struct InjectionAnnotations<'p> {
    program: &'p dyn ProgramModel,
}

impl<'p> InjectionAnnotations<'p> {
    pub fn new(program: &'p dyn ProgramModel) -> Self {
        Self { program }
    }

    fn is_meta_annotated(&self, annotation: &Annotation, meta: &str, well_known: &[&str]) -> bool {
        if well_known.iter().any(|name| annotation.is(name)) {
            return true;
        }
        self.program
            .type_element(&annotation.annotation_type)
            .is_some_and(|element| element.annotations.iter().any(|a| a.is(meta)))
    }

    pub fn is_qualifier(&self, annotation: &Annotation) -> bool {
        self.is_meta_annotated(annotation, names::QUALIFIER, WELL_KNOWN_QUALIFIERS)
    }

    pub fn is_scope(&self, annotation: &Annotation) -> bool {
        self.is_meta_annotated(annotation, names::SCOPE, WELL_KNOWN_SCOPES)
    }

    pub fn is_map_key(&self, annotation: &Annotation) -> bool {
        self.is_meta_annotated(annotation, names::MAP_KEY, WELL_KNOWN_MAP_KEYS)
    }

    pub fn qualifiers(&self, annotations: &[Annotation]) -> Vec<Annotation> {
        annotations.iter().filter(|a| self.is_qualifier(a)).cloned().collect()
    }

    /// The first qualifier; multiple qualifiers are reported by declaration
    /// validation
    pub fn qualifier(&self, annotations: &[Annotation]) -> Option<Annotation> {
        annotations.iter().find(|a| self.is_qualifier(a)).cloned()
    }

    pub fn scopes(&self, annotations: &[Annotation]) -> Vec<Scope> {
        annotations
            .iter()
            .filter(|a| self.is_scope(a))
            .cloned()
            .map(Scope::new)
            .collect()
    }

    pub fn map_keys(&self, annotations: &[Annotation]) -> Vec<Annotation> {
        annotations.iter().filter(|a| self.is_map_key(a)).cloned().collect()
    }

    /// Any annotation whose simple name is `Nullable`
    pub fn is_nullable(&self, annotations: &[Annotation]) -> bool {
        annotations
            .iter()
            .any(|a| a.annotation_type.simple_name() == names::NULLABLE_SIMPLE_NAME)
    }

    /// The `K` of `Map<K, V>` contributed under the given map key annotation
    pub fn map_key_type(&self, map_key: &Annotation) -> TypeMirror {
        match map_key.annotation_type.as_str() {
            names::STRING_KEY => return TypeMirror::named(names::STRING),
            names::INT_KEY => return TypeMirror::named("java.lang.Integer"),
            names::LONG_KEY => return TypeMirror::named("java.lang.Long"),
            names::CLASS_KEY => {
                return TypeMirror::declared(names::CLASS, vec![TypeMirror::wildcard()]);
            }
            _ => {}
        }
        let element = self.program.type_element(&map_key.annotation_type);
        let unwrap_value = element
            .and_then(|e| e.annotations.iter().find(|a| a.is(names::MAP_KEY)))
            .is_none_or(|meta| meta.bool_value("unwrapValue", true));
        if !unwrap_value {
            return TypeMirror::Declared {
                name: map_key.annotation_type.clone(),
                args: Vec::new(),
            };
        }
        if let Some(member) = element.and_then(|e| e.methods.first()) {
            return member.return_type.boxed();
        }
        match map_key.value("value") {
            Some(AnnotationValue::Str(_)) => TypeMirror::named(names::STRING),
            Some(AnnotationValue::Int(_)) => TypeMirror::named("java.lang.Integer"),
            Some(AnnotationValue::Bool(_)) => TypeMirror::named("java.lang.Boolean"),
            Some(AnnotationValue::Type(_)) => TypeMirror::declared(names::CLASS, vec![TypeMirror::wildcard()]),
            Some(AnnotationValue::Enum { ty, .. }) => TypeMirror::Declared {
                name: ty.clone(),
                args: Vec::new(),
            },
            _ => TypeMirror::Declared {
                name: map_key.annotation_type.clone(),
                args: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MethodSpec, ProgramBuilder};

    #[test]
    fn test_meta_annotations() {
        let mut b = ProgramBuilder::new();
        b.qualifier("test.Blue");
        b.scope("test.ActivityScope");
        let program = b.build();
        let injection = InjectionAnnotations::new(&program);

        assert!(injection.is_qualifier(&Annotation::new("test.Blue")));
        assert!(injection.is_qualifier(&Annotation::new(names::NAMED)));
        assert!(!injection.is_qualifier(&Annotation::new("test.ActivityScope")));
        assert!(injection.is_scope(&Annotation::new("test.ActivityScope")));
        assert!(injection.is_scope(&Annotation::new(names::SINGLETON)));
    }

    #[test]
    fn test_nullable_by_simple_name() {
        let program = ProgramBuilder::new().build();
        let injection = InjectionAnnotations::new(&program);
        assert!(injection.is_nullable(&[Annotation::new("javax.annotation.Nullable")]));
        assert!(injection.is_nullable(&[Annotation::new("androidx.annotation.Nullable")]));
        assert!(!injection.is_nullable(&[Annotation::new(names::INJECT)]));
    }

    #[test]
    fn test_map_key_types() {
        let mut b = ProgramBuilder::new();
        b.annotation_type("test.ColorKey")
            .annotate(Annotation::new(names::MAP_KEY))
            .method(MethodSpec::abstract_method("value").returns(TypeMirror::named("test.Color")))
            .finish();
        let program = b.build();
        let injection = InjectionAnnotations::new(&program);

        assert_eq!(
            injection.map_key_type(&Annotation::new(names::STRING_KEY).with_str("a")),
            TypeMirror::named(names::STRING)
        );
        assert_eq!(
            injection.map_key_type(&Annotation::new("test.ColorKey")),
            TypeMirror::named("test.Color")
        );
        assert!(injection.is_map_key(&Annotation::new("test.ColorKey")));
    }
}
