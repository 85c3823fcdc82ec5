//! Property-based tests for the run loop and the cell encoding.

mod common;

use common::{config_in, run, run_with};
use proptest::prelude::*;
use tempfile::tempdir;
use veighty_core::vm::{HandleId, TAG_BIT};
use veighty_core::{OpCode, ProgramBuilder, TaggedValue, Value, VmConfig};

proptest! {
    /// Pushed immediates never arrive carrying the tag bit.
    #[test]
    fn prop_push_strips_tag(value in any::<u64>()) {
        let program = ProgramBuilder::new()
            .push(value)
            .op(OpCode::Pop)
            .build()
            .unwrap();
        let r = run(&program);
        prop_assert_eq!(r.stdout(), format!("{:#x}\n", value & !TAG_BIT));
    }

    /// Arbitrary bytes always stop within the cycle ceiling without panicking.
    #[test]
    fn prop_random_programs_terminate(
        bytes in prop::collection::vec(any::<u8>(), 0..512),
        input in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let dir = tempdir().unwrap();
        let config = VmConfig { cycle_limit: 1024, ..config_in(dir.path()) };
        let r = run_with(config, &bytes, &input);
        prop_assert!(r.summary.cycles <= 1024);
        prop_assert_eq!(r.vm.cycles(), r.summary.cycles);
    }

    /// `cpy` of a string yields a distinct handle with equal contents.
    #[test]
    fn prop_cpy_never_aliases(text in "[a-z]{1,32}") {
        let program = ProgramBuilder::new()
            .pushs(text.as_bytes())
            .op(OpCode::Cpy)
            .op(OpCode::StrCat)
            .op(OpCode::PopS)
            .build()
            .unwrap();
        let r = run(&program);
        prop_assert_eq!(r.stdout(), format!("{}{}\n", text, text));
        prop_assert_eq!(r.vm.live_strings(), 0);
    }

    /// Handles decode back to the id they were built from.
    #[test]
    fn prop_handle_cells_decode(raw in 1u64..(1 << 63)) {
        let cell = TaggedValue::from_raw(raw | TAG_BIT);
        prop_assert!(cell.is_handle());
        prop_assert_eq!(cell.decode(), Value::String(HandleId::from_raw(raw)));
    }
}
