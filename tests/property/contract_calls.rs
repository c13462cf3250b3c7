//! Property tests for the contract call builders.
//!
//! Uses proptest to verify:
//! 1. `create_task` keeps its 13 arguments in contract order for any input.
//! 2. Empty options keep their inner type.
//! 3. Every board-scoped call takes the board as its first object argument.
//! 4. Call descriptors survive a JSON round trip (they are handed to an
//!    external signer as JSON).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use toad_proto::call::{CallArg, ContractFunction, MoveCall, PureValue, TypeTag};
use toad_proto::contract::{Contract, CreateTaskParams};
use toad_proto::model::{Priority, Role};
use toad_proto::object::{Address, ObjectId};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_hex_id() -> impl Strategy<Value = ObjectId> {
    "0x[0-9a-f]{1,64}".prop_map(ObjectId::new)
}

fn arb_priority() -> impl Strategy<Value = Option<Priority>> {
    prop::option::of(prop::sample::select(Priority::ALL.to_vec()))
}

fn arb_params() -> impl Strategy<Value = CreateTaskParams> {
    (
        arb_hex_id(),
        ".{0,40}",
        ".{0,80}",
        "[A-Za-z ]{1,20}",
        arb_priority(),
        prop::option::of(any::<u64>()),
        prop::collection::vec("0x[0-9a-f]{4}", 0..4),
        prop::option::of("[a-z0-9]{1,8}"),
        prop::collection::vec("[a-z]{1,6}", 0..4),
        prop::option::of(prop::collection::vec(any::<u8>(), 12..64)),
        any::<u64>(),
    )
        .prop_map(
            |(board_id, title, description, column, priority, due_at_ms, assignees, milestone, tags, ciphertext, team_id)| {
                CreateTaskParams {
                    board_id,
                    title,
                    description,
                    column,
                    priority,
                    due_at_ms,
                    assignees: assignees.into_iter().map(Address::new).collect(),
                    milestone,
                    tags,
                    is_encrypted: ciphertext.is_some(),
                    ciphertext,
                    team_id,
                }
            },
        )
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn contract() -> Contract {
    Contract::new(ObjectId::new("0xpkg"), ObjectId::new("0xreg"))
}

fn pure(call: &MoveCall, index: usize) -> &PureValue {
    match &call.arguments[index] {
        CallArg::Pure { value } => value,
        CallArg::Object { id } => panic!("argument {index} is object {id}"),
    }
}

fn board_calls(c: &Contract, board: &ObjectId, task: &ObjectId) -> Vec<MoveCall> {
    let cap = ObjectId::new("0xcap");
    let member = Address::new("0xb0b");
    vec![
        c.delete_board(board, &cap),
        c.update_board_columns(board, &cap, &["A".to_string()]),
        c.add_member(board, &cap, &member, Role::Viewer),
        c.update_member_role(board, &cap, &member, Role::Admin),
        c.remove_member(board, &cap, &member),
        c.update_task_position(board, task, "Done"),
        c.update_task_details(board, task, "t", "d"),
        c.set_task_due_date(board, task, 1),
        c.assign_task(board, task, &[member.clone()]),
        c.set_task_milestone(board, task, "m"),
        c.set_task_tags(board, task, &["x".to_string()]),
        c.set_task_priority(board, task, Priority::High),
        c.delete_task(board, task),
        c.create_subtask(board, task, "s"),
        c.toggle_subtask_done(board, task, &ObjectId::new("0x5b")),
        c.add_comment(board, task, "hi", None),
        c.add_reaction(board, task, &ObjectId::new("0xc0"), "+1"),
    ]
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn create_task_argument_order(params in arb_params()) {
        let c = contract();
        let call = c.create_task(&params);

        prop_assert_eq!(call.function, ContractFunction::CreateTask);
        prop_assert_eq!(call.arguments.len(), 13);
        prop_assert_eq!(call.arguments[0].as_object(), Some(&params.board_id));
        prop_assert_eq!(pure(&call, 1), &PureValue::String(params.title.clone()));
        prop_assert_eq!(pure(&call, 2), &PureValue::String(params.description.clone()));
        prop_assert_eq!(pure(&call, 3), &PureValue::String(params.column.clone()));
        prop_assert_eq!(pure(&call, 4).type_tag(), TypeTag::Option(Box::new(TypeTag::U8)));
        prop_assert_eq!(pure(&call, 5).type_tag(), TypeTag::Option(Box::new(TypeTag::U64)));
        prop_assert_eq!(pure(&call, 6), &PureValue::AddressVec(params.assignees.clone()));
        prop_assert_eq!(pure(&call, 7).type_tag(), TypeTag::Option(Box::new(TypeTag::String)));
        prop_assert_eq!(pure(&call, 8), &PureValue::StringVec(params.tags.clone()));
        prop_assert_eq!(pure(&call, 9), &PureValue::Bool(params.is_encrypted));
        prop_assert_eq!(
            pure(&call, 10).type_tag(),
            TypeTag::Option(Box::new(TypeTag::Vector(Box::new(TypeTag::U8))))
        );
        prop_assert_eq!(pure(&call, 11), &PureValue::U64(params.team_id));
        prop_assert_eq!(call.arguments[12].as_object(), Some(&c.clock_id));
    }

    #[test]
    fn priority_option_carries_code(priority in arb_priority()) {
        let params = CreateTaskParams { priority, ..CreateTaskParams::default() };
        let call = contract().create_task(&params);
        let expected = PureValue::option(TypeTag::U8, priority.map(|p| PureValue::U8(p.code())));
        prop_assert_eq!(pure(&call, 4), &expected);
    }

    #[test]
    fn board_is_first_argument(board in arb_hex_id(), task in arb_hex_id()) {
        let c = contract();
        for call in board_calls(&c, &board, &task) {
            prop_assert_eq!(call.board_id(), Some(&board), "{}", call.function);
            prop_assert_eq!(&call.package, &c.package_id);
            prop_assert_eq!(call.module.as_str(), "kanban");
        }
    }

    #[test]
    fn descriptor_json_round_trip(params in arb_params()) {
        let call = contract().create_task(&params);
        let json = serde_json::to_string(&call).unwrap();
        let back: MoveCall = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, call);
    }
}

#[test]
fn create_board_attaches_registry_and_clock() {
    let c = contract();
    let call = c.create_board("Roadmap", "", &[]);
    assert_eq!(call.board_id(), None);
    assert_eq!(call.arguments.len(), 5);
    assert_eq!(call.arguments[3].as_object(), Some(&c.registry_id));
    assert_eq!(call.arguments[4].as_object(), Some(&c.clock_id));
    assert_eq!(call.target(), "0xpkg::kanban::create_board");
}

#[test]
fn add_member_attaches_registry() {
    let c = contract();
    let call = c.add_member(
        &ObjectId::new("0xb"),
        &ObjectId::new("0xcap"),
        &Address::new("0xb0b"),
        Role::Commenter,
    );
    assert_eq!(pure(&call, 3), &PureValue::U8(2));
    assert_eq!(call.arguments[4].as_object(), Some(&c.registry_id));
}

#[test]
fn empty_options_keep_inner_type() {
    let call = contract().create_task(&CreateTaskParams::default());
    assert_eq!(
        pure(&call, 10),
        &PureValue::Option {
            inner: TypeTag::Vector(Box::new(TypeTag::U8)),
            value: None,
        }
    );
    let json = serde_json::to_value(pure(&call, 5)).unwrap();
    assert_eq!(json["value"]["inner"], "u64");
}

#[test]
fn add_comment_flags_ciphertext() {
    let c = contract();
    let board = ObjectId::new("0xb");
    let task = ObjectId::new("0xt");

    let plain = c.add_comment(&board, &task, "ship it", None);
    assert_eq!(pure(&plain, 3), &PureValue::Bool(false));

    let sealed = c.add_comment(&board, &task, "", Some(&[1, 2, 3]));
    assert_eq!(pure(&sealed, 3), &PureValue::Bool(true));
    assert_eq!(
        pure(&sealed, 4),
        &PureValue::option(
            TypeTag::Vector(Box::new(TypeTag::U8)),
            Some(PureValue::Bytes(vec![1, 2, 3]))
        )
    );
    assert_eq!(sealed.arguments[5].as_object(), Some(&c.clock_id));
}
