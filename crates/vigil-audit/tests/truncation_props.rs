//! Property tests for column truncation.

use std::collections::BTreeMap;

use proptest::prelude::*;
use vigil_audit::{
    COLUMNS, ColumnKind, FieldValue, ListTruncation, POLICIES_MAX_LEN, TRUNCATION_MARKER,
    Truncator, truncate_chars, truncate_list,
};

fn policy_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zäöü0-9_]{1,40}", 1..30)
}

fn strategy() -> impl Strategy<Value = ListTruncation> {
    prop_oneof![
        Just(ListTruncation::Sequential),
        Just(ListTruncation::ShrinkLongest)
    ]
}

proptest! {
    #[test]
    fn list_never_exceeds_bound(tokens in policy_list(), max in 0usize..300, how in strategy()) {
        let list = tokens.join(",");
        match truncate_list(&list, max, how) {
            None => prop_assert!(list.chars().count() <= max),
            Some(out) => prop_assert!(out.chars().count() <= max),
        }
    }

    #[test]
    fn shortened_tokens_carry_the_marker(tokens in policy_list(), max in 1usize..300, how in strategy()) {
        let list = tokens.join(",");
        if let Some(out) = truncate_list(&list, max, how) {
            for token in out.split(',').filter(|t| !t.is_empty()) {
                prop_assert!(
                    tokens.iter().any(|t| t == token) || token.ends_with(TRUNCATION_MARKER),
                    "token {token:?} neither original nor marked"
                );
            }
        }
    }

    #[test]
    fn sequential_keeps_a_prefix(tokens in policy_list(), max in 1usize..300) {
        let list = tokens.join(",");
        if let Some(out) = truncate_list(&list, max, ListTruncation::Sequential) {
            let kept: Vec<&str> = out.split(',').collect();
            let Some((last, whole)) = kept.split_last() else {
                return Ok(());
            };
            for (got, original) in whole.iter().zip(&tokens) {
                prop_assert_eq!(*got, original.as_str());
            }
            let original = &tokens[whole.len()];
            let body = last.trim_end_matches(TRUNCATION_MARKER);
            prop_assert!(original.starts_with(body));
        }
    }

    #[test]
    fn text_cut_is_a_char_prefix(text in "\\PC{0,80}", max in 0usize..60) {
        match truncate_chars(&text, max) {
            None => prop_assert!(text.chars().count() <= max),
            Some(out) => {
                prop_assert_eq!(out.chars().count(), max);
                prop_assert!(text.starts_with(&out));
            },
        }
    }

    #[test]
    fn every_bounded_column_fits_after_truncation(text in "\\PC{0,300}", policies in policy_list()) {
        let mut fields = BTreeMap::new();
        for col in COLUMNS.iter().filter(|c| c.kind == ColumnKind::Text) {
            fields.insert(col.name.to_string(), FieldValue::from(text.as_str()));
        }
        fields.insert("policies".to_string(), FieldValue::from(policies.join(",")));

        let out = Truncator::default().truncate(fields);
        for col in COLUMNS.iter().filter(|c| c.kind == ColumnKind::Text) {
            let len = out[col.name].as_str().map_or(0, |s| s.chars().count());
            let bound = col.max_len.unwrap_or(usize::MAX);
            prop_assert!(len <= bound, "{} is {len} chars", col.name);
            prop_assert!(len <= POLICIES_MAX_LEN);
        }
    }
}
