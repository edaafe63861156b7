// S-expression flow graph serialization (ilsexp)
//
//  Copyright (C) 2014-2022 Ryan Specialty Group, LLC.
//
//  This file is part of ilsexp.
//
//  This program is free software: you can redistribute it and/or modify
//  it under the terms of the GNU General Public License as published by
//  the Free Software Foundation, either version 3 of the License, or
//  (at your option) any later version.
//
//  This program is distributed in the hope that it will be useful,
//  but WITHOUT ANY WARRANTY; without even the implied warranty of
//  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//  GNU General Public License for more details.
//
//  You should have received a copy of the GNU General Public License
//  along with this program.  If not, see <http://www.gnu.org/licenses/>.

use super::*;
use crate::{
    il::{object::Object, BinaryOpKind, BlockKind, InstrKind, Representation},
    program::{cid, CanonicalNameError, FieldGuard, Program},
    sexp::parse_str,
    sym::GlobalSymbolIntern,
};

type Sut = FlowGraph;

const PROGRAM: &str = r#"
(Program
  (Library "file:///main.dart"
    (Class Foo
      (Field x { final true, type_cid 3 })
      (Field y)
      (Field s { static true })
      (Function bar))
    (Function main)))
"#;

const MAIN: &str = "file:///main.dart:::main";

fn program() -> Program {
    Program::from_sexp(&parse_str(PROGRAM).unwrap()).unwrap()
}

fn flow_graph(body: &str) -> String {
    format!(r#"(FlowGraph "{MAIN}" {body})"#)
}

fn deserialize_with(program: &Program, body: &str) -> Result<Sut> {
    deserialize(program, &parse_str(&flow_graph(body)).unwrap())
}

fn sut(body: &str) -> Sut {
    deserialize_with(&program(), body).unwrap()
}

fn sut_err(body: &str) -> DeserializeError {
    deserialize_with(&program(), body).unwrap_err()
}

fn v(n: u32) -> SsaIndex {
    SsaIndex::new(n)
}

fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

const DIAMOND: &str = r#"
  (Constants
    (def v0 (Constant null))
    (def v1 (Constant 42) { type (CompileType 3 { nullable false }) }))
  (Entries
    (Normal B1 (def v2 (Parameter 0)) { deopt_id 1 }))
  (Block B1
    (CheckStackOverflow { deopt_id 2 })
    (Branch (StrictCompare v2 v0 { kind === }) B2 B3))
  (Block B2 { block_type Target } (Goto B4))
  (Block B3 { block_type Target } (Goto B4))
  (Block B4 { block_type Join }
    (def v3 (Phi v1 v2))
    (Return v3))
"#;

#[test]
fn minimal_graph() {
    let program = program();
    let sut = deserialize_with(
        &program,
        "(Constants (def v0 (Constant null)))
         (Entries (Normal B1))
         (Block B1 (Return v0))",
    )
    .unwrap();

    assert_eq!(program.resolve_function(MAIN), Ok(sut.function()));
    assert_eq!(&[b(1)], sut.entries());
    assert_eq!(1, sut.constants().len());
    assert_eq!(b(1), sut.max_block_id());
    assert_eq!(2, sut.current_ssa_temp_index());

    let entry = sut.block(b(1)).unwrap();
    assert_eq!(BlockKind::FunctionEntry { unchecked: false }, entry.kind());
    assert_eq!(&[BlockId::GRAPH_ENTRY], entry.predecessors());

    let ret = sut.instr(entry.instrs()[0]);
    match ret.kind() {
        InstrKind::Return(value) => {
            assert_eq!(sut.definition(v(0)), Some(sut.value(*value).definition()));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn diamond_with_phi() {
    let sut = sut(DIAMOND);

    assert_eq!(5, sut.current_ssa_temp_index());
    assert_eq!(b(4), sut.max_block_id());

    let join = sut.block(b(4)).unwrap();
    assert_eq!(BlockKind::Join, join.kind());
    assert_eq!(&[b(2), b(3)], join.predecessors());
    assert_eq!(1, join.phis().len());

    let phi = sut.instr(join.phis()[0]);
    assert_eq!(Some(v(3)), phi.ssa());

    match phi.kind() {
        InstrKind::Phi { inputs } => {
            let defs = inputs
                .iter()
                .map(|&input| sut.value(input).definition())
                .collect::<Vec<_>>();

            assert_eq!(
                vec![sut.definition(v(1)).unwrap(), sut.definition(v(2)).unwrap()],
                defs
            );
        }
        other => panic!("unexpected {other:?}"),
    }

    // The comparison belongs to the branch and not to the block.
    let entry = sut.block(b(1)).unwrap();
    assert_eq!(2, entry.instrs().len());
    assert_eq!(Some(1), entry.deopt_id());
    assert_eq!(Some(2), sut.instr(entry.instrs()[0]).meta().deopt_id);

    assert_eq!(Some(b(1)), sut.immediate_dominator(b(4)));
    assert_eq!(Some(b(1)), sut.immediate_dominator(b(2)));
    assert_eq!(Some(BlockId::GRAPH_ENTRY), sut.immediate_dominator(b(1)));
    assert!(sut.dominates(b(1), b(4)));
    assert!(!sut.dominates(b(2), b(4)));
    assert_eq!(&[BlockId::GRAPH_ENTRY, b(1)], &sut.reverse_postorder()[..2]);
}

#[test]
fn typed_constant_definition() {
    let sut = sut(DIAMOND);
    let def = sut.instr(sut.definition(v(1)).unwrap());

    assert_eq!(BlockId::GRAPH_ENTRY, def.block());
    assert_eq!(Some(cid::SMI), def.ty().and_then(|ty| ty.cid));
    assert_eq!(Some(false), def.ty().map(|ty| ty.nullable));
}

#[test]
fn loop_with_back_edge_phi() {
    let sut = sut(
        "(Constants (def v0 (Constant 1)) (def v2 (Constant 10)))
         (Entries (Normal B1))
         (Block B1 (Goto B2))
         (Block B2 { block_type Join }
           (def v1 (Phi v0 v3))
           (Branch (RelationalOp v1 v2 { kind < }) B3 B4))
         (Block B3 { block_type Target }
           (def v3 (BinarySmiOp v1 v0 { op_kind + }))
           (Goto B2))
         (Block B4 { block_type Target } (Return v1))",
    );

    let header = sut.block(b(2)).unwrap();
    assert_eq!(&[b(1), b(3)], header.predecessors());

    // The back-edge input was used before its definition was parsed.
    match sut.instr(header.phis()[0]).kind() {
        InstrKind::Phi { inputs } => assert_eq!(
            sut.definition(v(3)),
            Some(sut.value(inputs[1]).definition())
        ),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(Some(b(2)), sut.immediate_dominator(b(3)));
    assert_eq!(Some(b(2)), sut.immediate_dominator(b(4)));
    assert!(sut.dominates(b(2), b(3)));
    assert!(!sut.dominates(b(3), b(2)));
}

#[test]
fn constants_may_refer_forward() {
    let sut = sut(
        r#"(Constants
             (def v0 (Constant (ImmutableList v1 v2)))
             (def v1 (Constant 1))
             (def v2 (Constant "a")))
           (Entries (Normal B1))
           (Block B1 (Return v0))"#,
    );

    let object_of = |ssa| match sut.instr(sut.definition(ssa).unwrap()).kind() {
        InstrKind::Constant(id) => *id,
        other => panic!("unexpected {other:?}"),
    };

    assert_eq!(
        &Object::ImmutableList {
            elems: vec![object_of(v(1)), object_of(v(2))],
            type_args: None,
        },
        sut.objects().get(object_of(v(0)))
    );

    // Pool order is textual order.
    assert_eq!(
        vec![
            sut.definition(v(0)).unwrap(),
            sut.definition(v(1)).unwrap(),
            sut.definition(v(2)).unwrap(),
        ],
        sut.constants()
    );
}

#[test]
fn equal_constants_share_definition() {
    let sut = sut(
        "(Constants (def v0 (Constant 1)) (def v1 (Constant 1)))
         (Entries (Normal B1))
         (Block B1 (Return v1))",
    );

    assert_eq!(1, sut.constants().len());
    assert_eq!(sut.definition(v(0)), sut.definition(v(1)));

    // The shared definition keeps the first name.
    assert_eq!(Some(v(0)), sut.instr(sut.constants()[0]).ssa());
}

#[test]
fn equal_constants_merge_refinements() {
    let sut = sut(
        "(Constants
           (def v0 (Constant 1))
           (def v1 (Constant 1) { type (CompileType 3 { nullable false }) }))
         (Entries (Normal B1))
         (Block B1 (Return v0))",
    );

    let def = sut.instr(sut.definition(v(0)).unwrap());

    assert_eq!(sut.definition(v(0)), sut.definition(v(1)));
    assert_eq!(Some(cid::SMI), def.ty().and_then(|ty| ty.cid));
    assert_eq!(Some(false), def.ty().map(|ty| ty.nullable));
}

#[test]
fn equal_constants_conflicting_refinements_rejected() {
    let err = sut_err(
        "(Constants
           (def v0 (Constant 1) { type (CompileType 3 { nullable false }) })
           (def v1 (Constant 1) { type (CompileType 3) }))
         (Entries (Normal B1))
         (Block B1 (Return v0))",
    );

    assert_eq!(
        &DeserializeErrorKind::ConflictingConstantRefinement(v(0)),
        err.kind()
    );
}

#[test]
fn cyclic_constants_rejected() {
    let err = sut_err(
        "(Constants
           (def v0 (Constant (ImmutableList v1)))
           (def v1 (Constant (ImmutableList v0))))
         (Entries (Normal B1))
         (Block B1 (Return v0))",
    );

    assert_eq!(&DeserializeErrorKind::UndefinedUse(v(1)), err.kind());
}

#[test]
fn recursive_type_patched() {
    let sut = sut(
        r#"(Constants
             (def v0 (Constant (Type "file:///main.dart::Foo" {
               hash 1,
               type_args (TypeArguments (TypeRef { hash 1 }))
             }))))
           (Entries (Normal B1))
           (Block B1 (Return v0))"#,
    );

    let ty = match sut.instr(sut.definition(v(0)).unwrap()).kind() {
        InstrKind::Constant(id) => *id,
        other => panic!("unexpected {other:?}"),
    };

    let Object::Type { type_args: Some(args), .. } = sut.objects().get(ty) else {
        panic!("expected type");
    };
    let Object::TypeArguments(refs) = sut.objects().get(*args) else {
        panic!("expected type arguments");
    };

    assert_eq!(&Object::TypeRef(Some(ty)), sut.objects().get(refs[0]));
}

#[test]
fn type_ref_to_unknown_hash() {
    let err = sut_err(
        "(Constants (def v0 (Constant (TypeRef { hash 7 }))))
         (Entries (Normal B1))
         (Block B1 (Return v0))",
    );

    assert_eq!(&DeserializeErrorKind::UnknownTypeHash(7), err.kind());
}

#[test]
fn instance_constant_widens_guard() {
    let program = program();

    deserialize_with(
        &program,
        r#"(Constants
             (def v0 (Constant (Instance "file:///main.dart::Foo" {
               fields ("file:///main.dart::Foo.x" 3)
             }))))
           (Entries (Normal B1))
           (Block B1 (Return v0))"#,
    )
    .unwrap();

    let x = program.resolve_field("file:///main.dart::Foo.x").unwrap();
    assert_eq!(FieldGuard::Cid(cid::SMI), program.field_guard(x));
}

#[test]
fn instance_constant_within_guard_does_not_pause() {
    let program = program();
    let body = r#"(Constants
                    (def v0 (Constant (Instance "file:///main.dart::Foo" {
                      fields ("file:///main.dart::Foo.x" 3)
                    }))))
                  (Entries (Normal B1))
                  (Block B1 (Return v0))"#;

    deserialize_with(&program, body).unwrap();

    // Pausing here would wait forever on our own mutator.
    let _mutator = program.safepoint().enter();
    deserialize_with(&program, body).unwrap();

    let x = program.resolve_field("file:///main.dart::Foo.x").unwrap();
    assert_eq!(FieldGuard::Cid(cid::SMI), program.field_guard(x));
}

#[test]
fn instance_constant_field_checks() {
    let body = |field: &str, value: &str| {
        format!(
            r#"(Constants
                 (def v0 (Constant (Instance "file:///main.dart::Foo" {{
                   fields ("file:///main.dart::{field}" {value})
                 }}))))
               (Entries (Normal B1))
               (Block B1 (Return v0))"#
        )
    };

    assert!(matches!(
        sut_err(&body("Foo.y", "3")).kind(),
        DeserializeErrorKind::NonFinalField(_)
    ));
    assert!(matches!(
        sut_err(&body("Foo.x", r#""str""#)).kind(),
        DeserializeErrorKind::IllTypedField(_)
    ));
    assert!(matches!(
        sut_err(&body("Foo.s", "3")).kind(),
        DeserializeErrorKind::StaticFieldMismatch {
            expected_static: false,
            ..
        }
    ));

    // `null` is assignable to any field.
    deserialize_with(&program(), &body("Foo.x", "null")).unwrap();
}

#[test]
fn inherited_type_copied_from_definition() {
    let sut = sut(
        "(Constants (def v0 (Constant 1) { type (CompileType 3) }))
         (Entries (Normal B1))
         (Block B1 (Return (value v0 { inherit_type true })))",
    );

    let ret = sut.instr(sut.block(b(1)).unwrap().instrs()[0]);
    let InstrKind::Return(value) = ret.kind() else {
        panic!("expected return");
    };

    assert!(sut.value(*value).inherits_type());
    assert_eq!(
        Some(cid::SMI),
        sut.value(*value).reaching_type().and_then(|ty| ty.cid)
    );
}

#[test]
fn inherited_type_requires_definition_type() {
    let err = sut_err(
        "(Constants (def v0 (Constant 1)))
         (Entries (Normal B1))
         (Block B1 (Return (value v0 { inherit_type true })))",
    );

    assert_eq!(&DeserializeErrorKind::NoInheritedType(v(0)), err.kind());
}

#[test]
fn environment_cannot_refer_forward() {
    let err = sut_err(
        "(Constants (def v0 (Constant 1)))
         (Entries (Normal B1))
         (Block B1 { env (Env v0 v1) }
           (def v1 (Redefinition v0))
           (Return v1))",
    );

    assert_eq!(&DeserializeErrorKind::UseBeforeDefinition(v(1)), err.kind());
}

#[test]
fn undefined_use_reported_with_path() {
    let src = flow_graph(
        "(Constants (def v0 (Constant 1)))
         (Entries (Normal B1))
         (Block B1 (Return v9))",
    );
    let root = parse_str(&src).unwrap();
    let err = deserialize(&program(), &root).unwrap_err();

    assert_eq!(&DeserializeErrorKind::UndefinedUse(v(9)), err.kind());
    assert_eq!(
        Some(vec![PathElem::Index(4), PathElem::Index(2), PathElem::Index(1)]),
        err.path_from_root(&root)
    );
}

#[test]
fn unreachable_block() {
    let err = sut_err(
        "(Constants (def v0 (Constant 1)))
         (Entries (Normal B1))
         (Block B1 (Return v0))
         (Block B5 { block_type Target } (Return v0))",
    );

    assert_eq!(&DeserializeErrorKind::UnreachableBlock(b(5)), err.kind());
}

#[test]
fn block_id_checks() {
    assert_eq!(
        &DeserializeErrorKind::DuplicateBlock(b(1)),
        sut_err("(Entries (Normal B1)) (Block B1 (Goto B1)) (Block B1 (Goto B1))")
            .kind()
    );
    assert_eq!(
        &DeserializeErrorKind::ReservedBlock,
        sut_err("(Entries (Normal B1)) (Block B0 (Goto B1))").kind()
    );
    assert_eq!(
        &DeserializeErrorKind::UndefinedBlock(b(2)),
        sut_err("(Entries (Normal B2)) (Block B1 (Goto B1))").kind()
    );
    assert_eq!(
        &DeserializeErrorKind::DuplicateEntry(b(1)),
        sut_err(
            "(Entries (Normal B1) (Osr B1))
             (Block B1 (DebugStepCheck) (Goto B1))"
        )
        .kind()
    );
}

#[test]
fn sparse_block_ids_bounded() {
    let sut = sut(
        "(Constants (def v0 (Constant 1)))
         (Entries (Normal B100))
         (Block B100 (Return v0))",
    );
    assert_eq!(b(100), sut.max_block_id());

    assert_eq!(
        &DeserializeErrorKind::BlockIdTooLarge {
            id: b(u32::MAX),
            limit: 2 * global::MAX_BLOCK_ID_SPREAD,
        },
        sut_err(
            "(Entries (Normal B4294967295))
             (Block B4294967295 (Goto B4294967295))"
        )
        .kind()
    );
}

#[test]
fn sections_checked() {
    assert_eq!(
        &DeserializeErrorKind::MissingSection(ENTRIES_TAG),
        sut_err("(Block B1 (Goto B1))").kind()
    );
    assert_eq!(
        &DeserializeErrorKind::DuplicateSection(CONSTANTS_TAG),
        sut_err("(Constants) (Constants) (Entries)").kind()
    );
}

#[test]
fn unknown_function_rejected() {
    let root = parse_str(r#"(FlowGraph "file:///main.dart:::nope" (Entries))"#)
        .unwrap();
    let err = deserialize(&program(), &root).unwrap_err();

    assert!(matches!(
        err.kind(),
        DeserializeErrorKind::Name(CanonicalNameError::UnknownFunction(_))
    ));
}

#[test]
fn block_structure_checks() {
    let kind = |blocks: &str| {
        sut_err(&format!(
            "(Constants (def v0 (Constant 1))) (Entries (Normal B1)) {blocks}"
        ))
        .kind()
        .clone()
    };

    assert_eq!(
        DeserializeErrorKind::MissingControl,
        kind("(Block B1 (CheckStackOverflow))")
    );
    assert_eq!(
        DeserializeErrorKind::InstructionAfterControl,
        kind("(Block B1 (Return v0) (DebugStepCheck))")
    );
    assert_eq!(
        DeserializeErrorKind::ConstantOutsidePool,
        kind("(Block B1 (def v1 (Constant 2)) (Return v1))")
    );
    assert_eq!(
        DeserializeErrorKind::UnknownInstruction("Frobnicate".intern()),
        kind("(Block B1 (Frobnicate v0) (Return v0))")
    );
    assert_eq!(
        DeserializeErrorKind::PhiOutsideJoin,
        kind(
            "(Block B1 (Goto B2))
             (Block B2 { block_type Target } (def v1 (Phi v0)) (Return v1))"
        )
    );
    assert_eq!(
        DeserializeErrorKind::OnlyPhis,
        kind(
            "(Block B1 (Goto B2))
             (Block B2 { block_type Join } (def v1 (Phi v0)))"
        )
    );
    assert_eq!(
        DeserializeErrorKind::PhiAfterInstruction,
        kind(
            "(Block B1 (Goto B2))
             (Block B2 { block_type Join }
               (DebugStepCheck)
               (def v1 (Phi v0))
               (Return v1))"
        )
    );
    assert_eq!(
        DeserializeErrorKind::NotADefinition("Goto"),
        kind("(Block B1 (def v1 (Goto B1)))")
    );
    assert_eq!(
        DeserializeErrorKind::DuplicateDefinition(v(0)),
        kind("(Block B1 (def v0 (Redefinition v0)) (Return v0))")
    );
}

#[test]
fn edge_kinds_checked() {
    let kind = |blocks: &str| {
        sut_err(&format!(
            "(Constants (def v0 (Constant true))) (Entries (Normal B1)) {blocks}"
        ))
        .kind()
        .clone()
    };

    assert_eq!(
        DeserializeErrorKind::InvalidGotoTarget(b(2), BlockKind::Target),
        kind(
            "(Block B1 (Goto B2))
             (Block B2 { block_type Target } (Return v0))"
        )
    );
    assert_eq!(
        DeserializeErrorKind::InvalidBranchTarget(b(2), BlockKind::Join),
        kind(
            "(Block B1 (Branch (StrictCompare v0 v0 { kind === }) B2 B3))
             (Block B2 { block_type Join } (Return v0))
             (Block B3 { block_type Target } (Return v0))"
        )
    );
    assert_eq!(
        DeserializeErrorKind::PhiArity {
            expected: 2,
            found: 1
        },
        kind(
            "(Block B1 (Branch (StrictCompare v0 v0 { kind === }) B2 B3))
             (Block B2 { block_type Target } (Goto B4))
             (Block B3 { block_type Target } (Goto B4))
             (Block B4 { block_type Join } (def v1 (Phi v0)) (Return v1))"
        )
    );
    assert_eq!(
        DeserializeErrorKind::BlockTypeMismatch(
            b(1),
            BlockKind::FunctionEntry { unchecked: false }
        ),
        kind("(Block B1 { block_type Join } (Return v0))")
    );
}

#[test]
fn branch_requires_comparison() {
    let err = sut_err(
        "(Constants (def v0 (Constant true)))
         (Entries (Normal B1))
         (Block B1 (Branch (Redefinition v0) B2 B3))
         (Block B2 { block_type Target } (Return v0))
         (Block B3 { block_type Target } (Return v0))",
    );

    assert!(matches!(err.kind(), DeserializeErrorKind::ExpectedTag(_)));
}

#[test]
fn operand_checks() {
    let kind = |instr: &str| {
        sut_err(&format!(
            "(Constants (def v0 (Constant 1.5)))
             (Entries (Normal B1))
             (Block B1 {instr} (Return v0))"
        ))
        .kind()
        .clone()
    };

    assert_eq!(
        DeserializeErrorKind::UnsupportedOp(
            BinaryOpKind::Mod,
            Representation::Double
        ),
        kind("(def v1 (BinaryDoubleOp v0 v0 { op_kind % }))")
    );
    assert!(matches!(
        kind(r#"(def v1 (LoadStaticField "file:///main.dart::Foo.x"))"#),
        DeserializeErrorKind::StaticFieldMismatch {
            expected_static: true,
            ..
        }
    ));
    assert_eq!(
        DeserializeErrorKind::TooManyArgumentNames,
        kind(r#"(def v1 (StaticCall "file:///main.dart:::main" v0 { args_names ("a" "b") }))"#)
    );
    assert_eq!(
        DeserializeErrorKind::IcEntryArity {
            expected: 1,
            found: 2
        },
        kind(
            r#"(def v1 (InstanceCall foo v0 {
                 ic_data (ICData { num_args_tested 1 }
                   (Entry (3 5) "file:///main.dart::Foo:bar" 1))
               }))"#
        )
    );
    assert_eq!(
        DeserializeErrorKind::InvalidRange,
        kind("(def v1 (Redefinition v0) { range (Range 5 1) })")
    );
    assert!(matches!(
        kind("(def v1 (StrictCompare v0 v0 { kind == }))"),
        DeserializeErrorKind::UnknownSymbol { .. }
    ));
}

#[test]
fn instance_call_operands() {
    let sut = sut(
        r#"(Constants (def v0 (Constant 1)))
           (Entries (Normal B1 (def v1 (Parameter 0))))
           (Block B1
             (def v2 (InstanceCall bar v1 v0 {
               args_names ("n"),
               checked_arg_count 2,
               ic_data (ICData { num_args_tested 1 }
                 (Entry (20) "file:///main.dart::Foo:bar" 7))
             }) { range (Range -inf 10) })
             (Return v2))"#,
    );

    let call = sut.instr(sut.definition(v(2)).unwrap());
    let InstrKind::InstanceCall {
        selector,
        args,
        call: call_args,
        checked_arg_count,
        ic_data: Some(ic_data),
    } = call.kind()
    else {
        panic!("unexpected {call:?}");
    };

    assert_eq!("bar".intern(), *selector);
    assert_eq!(2, args.len());
    assert_eq!(vec!["n".intern()], call_args.args_names);
    assert_eq!(2, *checked_arg_count);
    assert_eq!(1, ic_data.entries().len());
    assert_eq!(7, ic_data.entries()[0].count);
    assert_eq!(
        Some(crate::il::RangeBoundary::NegInf),
        call.range().map(|range| range.min())
    );
}

#[test]
fn entry_kinds() {
    let sut = sut(
        "(Constants (def v0 (Constant 1)))
         (Entries
           (Normal B1)
           (Catch B2 (def v1 (SpecialParameter { kind Exception }))
             { catch_try_index 0, needs_stacktrace true, try_index 3 })
           (Indirect B3 { indirect_id 4 }))
         (Block B1 (Goto B3))
         (Block B2 (Throw v1))
         (Block B3 { block_type Join } (Return v0))",
    );

    assert_eq!(&[b(1), b(2), b(3)], sut.entries());
    assert_eq!(
        BlockKind::CatchEntry {
            catch_try_index: 0,
            needs_stacktrace: true
        },
        sut.block(b(2)).unwrap().kind()
    );
    assert_eq!(Some(3), sut.block(b(2)).unwrap().try_index());
    assert_eq!(
        BlockKind::IndirectEntry { indirect_id: 4 },
        sut.block(b(3)).unwrap().kind()
    );
    assert_eq!(&[b(1), b(2)], &sut.successors(BlockId::GRAPH_ENTRY)[..]);
    assert_eq!(&[b(1)], sut.block(b(3)).unwrap().predecessors());
    assert_eq!(Some(b(1)), sut.immediate_dominator(b(3)));
}

#[test]
fn unreached_indirect_entry_rejected() {
    let err = sut_err(
        "(Constants (def v0 (Constant 1)))
         (Entries (Normal B1) (Indirect B2 { indirect_id 0 }))
         (Block B1 (Return v0))
         (Block B2 { block_type Join } (Return v0))",
    );

    assert_eq!(&DeserializeErrorKind::UnreachableBlock(b(2)), err.kind());
}

#[test]
fn entry_definitions_are_parameters() {
    let err = sut_err(
        "(Constants (def v0 (Constant 1)))
         (Entries (Normal B1 (def v1 (Redefinition v0))))
         (Block B1 (Return v0))",
    );

    assert!(matches!(err.kind(), DeserializeErrorKind::ExpectedTag(_)));
}
