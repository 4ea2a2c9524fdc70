//! Property-based tests for the component tokenizer and occurrence counts.

use gedgram::component::{Component, tokenize};
use gedgram::structure::Count;
use proptest::prelude::*;

/// One component, rendered the way it appears in a grammar file.
fn component_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Z_]{1,10}".prop_map(|name| format!("<{}>", name)),
        "[A-Z]{1,6}".prop_map(|name| format!("{{{}}}", name)),
        "[A-Z]{1,6}".prop_map(|name| format!("%{}%", name)),
        "[^<{%]{1,8}",
    ]
}

proptest! {
    #[test]
    fn concatenated_components_rebuild_the_definition(
        parts in prop::collection::vec(component_text(), 0..8)
    ) {
        let definition: String = parts.concat();
        let tokenized = tokenize(&definition).unwrap();
        let rebuilt: String = tokenized.components.iter().map(|c| c.to_string()).collect();
        prop_assert_eq!(rebuilt, definition);
    }

    #[test]
    fn kinds_agree_with_components(parts in prop::collection::vec(component_text(), 0..8)) {
        let tokenized = tokenize(&parts.concat()).unwrap();
        let any = |f: fn(&Component) -> bool| tokenized.components.iter().any(f);
        prop_assert_eq!(tokenized.kinds.primitives, any(|c| matches!(c, Component::Primitive(_))));
        prop_assert_eq!(tokenized.kinds.terms, any(|c| matches!(c, Component::Term(_))));
        prop_assert_eq!(tokenized.kinds.tags, any(|c| matches!(c, Component::Tag(_))));
        prop_assert_eq!(tokenized.kinds.literals, any(|c| matches!(c, Component::Literal(_))));
    }

    #[test]
    fn literals_never_hold_opening_delimiters(definition in "\\PC{0,30}") {
        if let Ok(tokenized) = tokenize(&definition) {
            for component in &tokenized.components {
                if let Component::Literal(text) = component {
                    prop_assert!(!text.contains(['<', '{', '%']), "literal {:?} contains an opening delimiter", text);
                }
            }
        }
    }

    #[test]
    fn unlimited_bounds_every_finite_count(n in any::<u32>()) {
        prop_assert!(Count::Finite(n) <= Count::Unlimited);
        prop_assert!(Count::Unlimited > Count::Finite(n));
        prop_assert!(!(Count::Unlimited <= Count::Finite(n)));
    }
}
