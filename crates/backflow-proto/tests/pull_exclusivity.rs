//! Property tests for the iterator role of the generator contract.
//!
//! Whatever the input and however many calls follow, a pull generator
//! reports exactly one terminal reply and nothing after it.

use backflow_proto::{Generator, IterationResult, Pull};
use proptest::prelude::*;

fn pull_next(pull: &mut Pull<std::vec::IntoIter<u8>>) -> IterationResult<u8> {
    Generator::<(), String>::next(pull, ()).expect("pull never fails on next")
}

proptest! {
    #[test]
    fn exactly_one_terminal_reply(items in prop::collection::vec(any::<u8>(), 0..32), extra in 0usize..8) {
        let mut pull = Pull::new(items.clone());
        let mut values = Vec::new();
        let mut terminal = None;
        let mut after_terminal = Vec::new();

        for _ in 0..(items.len() + extra + 1) {
            let reply = pull_next(&mut pull);
            if terminal.is_some() {
                after_terminal.push(reply);
            } else if reply.done {
                terminal = Some(reply.value);
            } else {
                values.push(reply.value.expect("live reply carries a value"));
            }
        }

        let terminal = terminal.expect("generator must finish");
        let mut replayed = values.clone();
        replayed.extend(terminal);
        prop_assert_eq!(replayed, items);
        prop_assert!(after_terminal.iter().all(|r| *r == IterationResult::closed()));
    }

    #[test]
    fn complete_always_closes(items in prop::collection::vec(any::<u8>(), 1..16), pulls in 0usize..16) {
        let mut pull = Pull::new(items);
        for _ in 0..pulls {
            let _ = pull_next(&mut pull);
        }
        let reply = Generator::<(), String>::complete(&mut pull, None).unwrap();
        prop_assert!(reply.done);
        prop_assert!(pull.is_finished());
        prop_assert_eq!(pull_next(&mut pull), IterationResult::closed());
    }
}
