//! Property-based tests for the pure core: the branch scheme, the
//! trailer codec, and the numbering/chaining rules.

use proptest::prelude::*;

use cairn::core::branch;
use cairn::core::model::{compute_desired_bases, renumber, Change};
use cairn::core::trailer::{parse_message, render_message, Trailer};
use cairn::core::types::{ChangeId, Oid};

// =============================================================================
// Generators
// =============================================================================

prop_compose! {
    /// A 16-hex change id.
    fn arb_change_id()(raw in "[0-9a-f]{16}") -> ChangeId {
        ChangeId::new(raw).unwrap()
    }
}

prop_compose! {
    /// A single-segment username or stack name.
    fn arb_segment()(raw in "[a-z][a-z0-9-]{0,15}") -> String {
        raw
    }
}

prop_compose! {
    /// A commit title: one line, no leading/trailing whitespace.
    fn arb_title()(raw in "[A-Za-z][A-Za-z0-9 ]{0,40}[A-Za-z0-9]") -> String {
        raw
    }
}

prop_compose! {
    /// A body whose lines can never be mistaken for trailers (no colons)
    /// and which carries no leading/trailing blank lines.
    fn arb_body()(lines in prop::collection::vec("[a-z][a-z ]{0,30}[a-z]", 0..4)) -> String {
        lines.join("\n")
    }
}

prop_compose! {
    /// A trailer with a conventional key and a colon-free value.
    fn arb_trailer()(
        key in "[A-Za-z][A-Za-z0-9-]{0,12}",
        value in "[a-zA-Z0-9][a-zA-Z0-9 ./@-]{0,24}[a-zA-Z0-9]",
    ) -> Trailer {
        Trailer::new(key, value)
    }
}

fn arb_oid() -> impl Strategy<Value = Oid> {
    "[0-9a-f]{40}".prop_map(|raw| Oid::new(raw).unwrap())
}

prop_compose! {
    /// A change with a random merged flag.
    fn arb_change()(
        uuid in arb_change_id(),
        oid in arb_oid(),
        title in arb_title(),
        merged in any::<bool>(),
    ) -> Change {
        Change {
            position: 0,
            active_position: 0,
            title,
            description: String::new(),
            commit_hash: oid,
            uuid: Some(uuid),
            desired_base: String::new(),
            pr: None,
            is_merged: merged,
            merged_at: None,
            foreign_stack: None,
        }
    }
}

// =============================================================================
// Branch scheme
// =============================================================================

proptest! {
    #[test]
    fn uuid_branch_roundtrips(user in arb_segment(), stack in arb_segment(), id in arb_change_id()) {
        let name = branch::uuid_branch(&user, &stack, &id);
        prop_assert!(branch::is_uuid_branch(&name));
        prop_assert!(!branch::is_stack_branch(&name));
        prop_assert_eq!(branch::extract_stack_name(&name), Some(stack.as_str()));
        prop_assert_eq!(branch::extract_user(&name), Some(user.as_str()));
        prop_assert_eq!(branch::extract_uuid(&name), Some(id));
    }

    #[test]
    fn stack_branch_roundtrips(user in arb_segment(), stack in arb_segment()) {
        let name = branch::stack_branch(&user, &stack);
        prop_assert!(branch::is_stack_branch(&name));
        prop_assert!(!branch::is_uuid_branch(&name));
        prop_assert_eq!(branch::extract_stack_name(&name), Some(stack.as_str()));
    }

    #[test]
    fn leaf_is_uuid_iff_sixteen_hex(
        user in arb_segment(),
        stack in arb_segment(),
        leaf in "[a-zA-Z0-9]{1,20}",
    ) {
        let name = format!("{user}/stack-{stack}/{leaf}");
        prop_assert_eq!(branch::is_uuid_branch(&name), ChangeId::is_valid(&leaf));
    }
}

// =============================================================================
// Trailer codec
// =============================================================================

proptest! {
    #[test]
    fn message_roundtrips(
        title in arb_title(),
        body in arb_body(),
        trailers in prop::collection::vec(arb_trailer(), 0..5),
    ) {
        let rendered = render_message(&title, &body, &trailers);
        let parsed = parse_message(&rendered);
        prop_assert_eq!(parsed.title, title);
        prop_assert_eq!(parsed.body, body);
        prop_assert_eq!(parsed.trailers, trailers);
    }

    #[test]
    fn stack_trailers_always_recoverable(
        title in arb_title(),
        body in arb_body(),
        id in arb_change_id(),
        stack in arb_segment(),
    ) {
        let trailers = vec![
            Trailer::new("PR-UUID", id.as_str()),
            Trailer::new("PR-Stack", stack.clone()),
        ];
        let rendered = render_message(&title, &body, &trailers);
        let parsed = parse_message(&rendered);
        prop_assert_eq!(parsed.pr_uuid(), Some(id));
        prop_assert_eq!(parsed.pr_stack(), Some(stack.as_str()));
    }
}

// =============================================================================
// Numbering and chaining
// =============================================================================

proptest! {
    #[test]
    fn positions_are_contiguous(mut changes in prop::collection::vec(arb_change(), 0..12)) {
        renumber(&mut changes);

        // position is 1..=n without gaps or duplicates.
        let positions: Vec<u32> = changes.iter().map(|c| c.position).collect();
        let expected: Vec<u32> = (1..=changes.len() as u32).collect();
        prop_assert_eq!(positions, expected);

        // active_position is 1..=m over unmerged changes and 0 for merged.
        let mut expected_active = 0;
        for change in &changes {
            if change.is_merged {
                prop_assert_eq!(change.active_position, 0);
            } else {
                expected_active += 1;
                prop_assert_eq!(change.active_position, expected_active);
            }
        }
    }

    #[test]
    fn desired_base_chains_through_previous_change(
        mut changes in prop::collection::vec(arb_change(), 1..10),
        user in arb_segment(),
        stack in arb_segment(),
    ) {
        for change in &mut changes {
            change.is_merged = false;
        }
        compute_desired_bases(&mut changes, &user, &stack, "main");

        prop_assert_eq!(changes[0].desired_base.as_str(), "main");
        for window in changes.windows(2) {
            let previous = window[0].uuid.as_ref().unwrap();
            prop_assert_eq!(
                window[1].desired_base.clone(),
                branch::uuid_branch(&user, &stack, previous)
            );
        }
    }
}
