// tests/property/session_test.rs

//! Property-based tests for session ownership
//! Tests that an account is held by at most one session, and only while that session holds it

use proptest::prelude::*;
use sessiond::connection::Session;
use sessiond::core::accounts::{AccountRegistry, load};
use sessiond::core::activity::NullActivityLog;
use std::net::SocketAddr;
use std::sync::Arc;

const NAMES: [&str; 3] = ["alice", "bob", "carol"];

#[derive(Debug, Clone)]
enum Step {
    Line(usize, String),
    Drop(usize),
}

fn step() -> impl Strategy<Value = Step> {
    let line = prop_oneof![
        (0..3usize).prop_map(|i| format!("USER {}", NAMES[i])),
        Just("POST hi".to_string()),
        Just("BYE".to_string()),
        Just("JUNK".to_string()),
    ];
    prop_oneof![
        8 => (0..4usize, line).prop_map(|(s, l)| Step::Line(s, l)),
        1 => (0..4usize).prop_map(Step::Drop),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_registry_mirrors_live_sessions(steps in prop::collection::vec(step(), 0..60)) {
        let registry = Arc::new(AccountRegistry::from_accounts(
            load("alice 1\nbob 1\ncarol 0\n").unwrap(),
        ));
        let peer: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let open = |id: u64| Session::new(id, peer, registry.clone(), Arc::new(NullActivityLog));
        let mut sessions: Vec<Session> = (0..4).map(|i| open(i as u64)).collect();
        let mut next_id = 4;

        for step in steps {
            match step {
                Step::Line(index, line) => {
                    sessions[index].handle_line(&line);
                }
                Step::Drop(index) => {
                    // Replacing the session drops the old one, as a disconnect would.
                    sessions[index] = open(next_id);
                    next_id += 1;
                }
            }

            for name in NAMES {
                let holders = sessions
                    .iter()
                    .filter(|s| s.username() == Some(name))
                    .count();
                prop_assert!(holders <= 1);
                prop_assert_eq!(registry.is_in_session(name), Some(holders == 1));
            }
        }
    }
}
