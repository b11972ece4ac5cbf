//! Map multibindings whose contributions disagree about their keys

use super::{BindingGraphPlugin, ValidationEnv, INDENT};
use crate::binding::{sorted_descriptions, BindingDeclaration, BindingKind, BindingRef};
use crate::diagnostics::{DiagnosticReporter, Severity};
use crate::graph::{BindingGraph, BindingNetwork, ComponentPath, NodeId};
use crate::key::Key;
use crate::model::{Annotation, TypeName};
use ahash::AHashSet;

pub struct MapMultibindingValidator;

impl BindingGraphPlugin for MapMultibindingValidator {
    fn plugin_name(&self) -> &'static str {
        "Dagger/MapKeys"
    }

    fn visit_graph(&self, graph: &BindingGraph, _env: &ValidationEnv<'_>, reporter: &mut DiagnosticReporter) {
        let network = graph.network();
        // Map<K, V>, Map<K, Provider<V>> and Map<K, Producer<V>> share
        // contributions; check each map once per component
        let mut seen: AHashSet<(ComponentPath, Key)> = AHashSet::new();
        for (node, owner, binding) in network.binding_nodes() {
            if binding.kind() != BindingKind::MultiboundMap {
                continue;
            }
            if !seen.insert((owner.clone(), binding.key.unwrap_map_value_type())) {
                continue;
            }
            let contributions = contributions(network, node);
            check_duplicate_map_keys(owner, binding, &contributions, reporter);
            check_inconsistent_map_key_types(owner, binding, &contributions, reporter);
        }
    }
}

fn contributions(network: &BindingNetwork, node: NodeId) -> Vec<&BindingRef> {
    network
        .requested_bindings(node)
        .into_iter()
        .filter_map(|id| network.node(id).binding())
        .collect()
}

/// Groups `items` by `key_of`, keeping first-seen order
fn group_by<'a, K: PartialEq>(
    items: &[&'a BindingRef],
    key_of: impl Fn(&BindingRef) -> Option<K>,
) -> Vec<(K, Vec<&'a BindingRef>)> {
    let mut groups: Vec<(K, Vec<&'a BindingRef>)> = Vec::new();
    for &item in items {
        let Some(key) = key_of(item) else { continue };
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    groups
}

fn describe_all(bindings: &[&BindingRef], indent: &str) -> String {
    sorted_descriptions(bindings.iter().map(|b| b.as_ref() as &dyn BindingDeclaration))
        .into_iter()
        .map(|d| format!("\n{}{}", indent, d))
        .collect()
}

fn check_duplicate_map_keys(
    owner: &ComponentPath,
    map: &BindingRef,
    contributions: &[&BindingRef],
    reporter: &mut DiagnosticReporter,
) {
    let groups = group_by(contributions, |b| b.map_key.clone());
    for (_, bindings) in groups.iter().filter(|(_, b)| b.len() > 1) {
        let message = format!(
            "The same map key is bound more than once for {}{}",
            map.key,
            describe_all(bindings, INDENT)
        );
        let element = bindings.iter().find_map(|b| b.binding_element);
        reporter.report_component(Severity::Error, owner, element, message);
    }
}

fn check_inconsistent_map_key_types(
    owner: &ComponentPath,
    map: &BindingRef,
    contributions: &[&BindingRef],
    reporter: &mut DiagnosticReporter,
) {
    let groups: Vec<(TypeName, Vec<&BindingRef>)> =
        group_by(contributions, |b| b.map_key.as_ref().map(|a: &Annotation| a.annotation_type.clone()));
    if groups.len() < 2 {
        return;
    }
    let mut message = format!("{} uses more than one @MapKey annotation type", map.key);
    for (annotation_type, bindings) in &groups {
        message.push_str(&format!("\n{}{}:", INDENT, annotation_type));
        message.push_str(&describe_all(bindings, &INDENT.repeat(2)));
    }
    reporter.report_component(Severity::Error, owner, None, message);
}

#[cfg(test)]
mod tests {
    use super::super::tests::{provides, run};
    use super::*;
    use crate::framework::{self, names};
    use crate::model::{MethodSpec, ProgramBuilder, TypeMirror};
    use crate::options::CompilerOptions;

    fn into_map(name: &str, key: Annotation) -> MethodSpec {
        provides(name, TypeMirror::named("test.Foo"))
            .annotate(Annotation::new(names::INTO_MAP))
            .annotate(key)
    }

    fn app(b: &mut ProgramBuilder) {
        let map = framework::map_of(TypeMirror::named(names::STRING), TypeMirror::named("test.Foo"));
        b.interface("test.App")
            .annotate(Annotation::new(names::COMPONENT).with_types("modules", vec![TypeMirror::named("test.M")]))
            .method(MethodSpec::new("map").returns(map))
            .finish();
    }

    #[test]
    fn test_same_map_key_bound_twice() {
        let mut b = ProgramBuilder::new();
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(into_map("a", Annotation::new(names::STRING_KEY).with_str("k")))
            .method(into_map("b", Annotation::new(names::STRING_KEY).with_str("k")))
            .method(into_map("c", Annotation::new(names::STRING_KEY).with_str("other")))
            .finish();
        app(&mut b);
        let program = b.build();

        let diagnostics = run(&MapMultibindingValidator, &program, "test.App", CompilerOptions::default(), false);
        assert_eq!(diagnostics.len(), 1);
        let message = &diagnostics[0].message;
        assert!(message.starts_with("The same map key is bound more than once for java.util.Map<java.lang.String,test.Foo>"));
        assert!(message.contains("test.M.a()"));
        assert!(message.contains("test.M.b()"));
        assert!(!message.contains("test.M.c()"));
    }

    #[test]
    fn test_more_than_one_map_key_type() {
        let mut b = ProgramBuilder::new();
        b.annotation_type("test.NameKey")
            .annotate(Annotation::new(names::MAP_KEY))
            .method(MethodSpec::abstract_method("value").returns(TypeMirror::named(names::STRING)))
            .finish();
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(into_map("a", Annotation::new(names::STRING_KEY).with_str("a")))
            .method(into_map("b", Annotation::new("test.NameKey").with_str("b")))
            .finish();
        app(&mut b);
        let program = b.build();

        let diagnostics = run(&MapMultibindingValidator, &program, "test.App", CompilerOptions::default(), false);
        assert_eq!(diagnostics.len(), 1);
        let message = &diagnostics[0].message;
        assert!(message.contains("uses more than one @MapKey annotation type"));
        assert!(message.contains(&format!("\n{}{}:", INDENT, names::STRING_KEY)));
        assert!(message.contains(&format!("\n{}test.NameKey:", INDENT)));
    }

    #[test]
    fn test_distinct_keys_are_clean() {
        let mut b = ProgramBuilder::new();
        b.class("test.M")
            .annotate(Annotation::new(names::MODULE))
            .method(into_map("a", Annotation::new(names::STRING_KEY).with_str("a")))
            .method(into_map("b", Annotation::new(names::STRING_KEY).with_str("b")))
            .finish();
        app(&mut b);
        let program = b.build();

        assert!(run(&MapMultibindingValidator, &program, "test.App", CompilerOptions::default(), false).is_empty());
    }
}
