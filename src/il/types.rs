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

//! Structured operands of instructions.
//!
//! Each of these types has a dedicated text form
//!   (e.g. `(CompileType 3 { nullable false })` or `(Range 0 +inf)`);
//!     see [`super::deserialize`] and [`super::serialize`].
//! Enumerations carried as symbols
//!   (operator kinds, comparison kinds, and the like)
//!   are convertible to and from their textual names here,
//!     which keeps the deserializer and serializer in agreement.

use super::ObjectId;
use crate::{
    global,
    program::{ClassId, FieldId, FunctionId},
    sym::SymbolId,
};
use arrayvec::ArrayVec;
use std::fmt::Display;

/// Statically inferred type of a definition or use.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileType {
    pub cid: Option<ClassId>,
    pub nullable: bool,

    /// Human-readable name of the type.
    pub name: Option<SymbolId>,

    /// Type object,
    ///   if known.
    pub ty: Option<ObjectId>,
}

impl Default for CompileType {
    fn default() -> Self {
        Self {
            cid: None,
            nullable: true,
            name: None,
            ty: None,
        }
    }
}

/// Bound of a [`Range`].
///
/// Variants are declared in ascending order so that the derived [`Ord`]
///   matches numeric order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RangeBoundary {
    NegInf,
    Const(i64),
    PosInf,
}

impl RangeBoundary {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "-inf" => Some(Self::NegInf),
            "+inf" => Some(Self::PosInf),
            _ => None,
        }
    }
}

impl Display for RangeBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegInf => write!(f, "-inf"),
            Self::Const(n) => write!(f, "{n}"),
            Self::PosInf => write!(f, "+inf"),
        }
    }
}

/// Integer range of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    min: RangeBoundary,
    max: RangeBoundary,
}

impl Range {
    /// A range from `min` to `max` inclusive,
    ///   if that range is non-empty.
    pub fn new(min: RangeBoundary, max: RangeBoundary) -> Option<Self> {
        (min <= max && min != RangeBoundary::PosInf && max != RangeBoundary::NegInf)
            .then_some(Self { min, max })
    }

    pub fn min(&self) -> RangeBoundary {
        self.min
    }

    pub fn max(&self) -> RangeBoundary {
        self.max
    }
}

/// Location accessed by a field load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// An instance field declared by a program class.
    Dart(FieldId),

    /// A field of an object that is implemented natively.
    Native(NativeSlot),
}

macro_rules! symbolic_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $( $(#[$vattr:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vattr])* $variant, )+
        }

        impl $name {
            /// Textual names of every variant.
            pub const NAMES: &'static [&'static str] = &[$($text),+];

            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $( $text => Some(Self::$variant), )+
                    _ => None,
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text, )+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

symbolic_enum! {
    pub enum NativeSlot {
        ArrayLength => "Array_length",
        GrowableObjectArrayLength => "GrowableObjectArray_length",
        StringLength => "String_length",
        TypeArgumentsLength => "TypeArguments_length",
        ClosureContext => "Closure_context",
        ClosureFunction => "Closure_function",
        ContextParent => "Context_parent",
    }
}

symbolic_enum! {
    pub enum SpecialParameterKind {
        Exception => "Exception",
        StackTrace => "StackTrace",
        ArgDescriptor => "ArgDescriptor",
        Context => "Context",
    }
}

symbolic_enum! {
    /// Nullability of a type object.
    pub enum Nullability {
        Nullable => "nullable",
        NonNullable => "non_nullable",
        Legacy => "legacy",
    }
}

impl Default for Nullability {
    fn default() -> Self {
        Self::NonNullable
    }
}

symbolic_enum! {
    pub enum BinaryOpKind {
        Add => "+",
        Sub => "-",
        Mul => "*",
        TruncDiv => "~/",
        Div => "/",
        Mod => "%",
        BitAnd => "&",
        BitOr => "|",
        BitXor => "^",
        Shl => "<<",
        Shr => ">>",
    }
}

symbolic_enum! {
    pub enum UnaryOpKind {
        Negate => "-",
        BitNot => "~",
    }
}

symbolic_enum! {
    pub enum ComparisonKind {
        StrictEq => "===",
        StrictNe => "!==",
        Eq => "==",
        Ne => "!=",
        Lt => "<",
        Gt => ">",
        Le => "<=",
        Ge => ">=",
    }
}

impl ComparisonKind {
    pub const STRICT: &'static [&'static str] = &["===", "!=="];
    pub const EQUALITY: &'static [&'static str] = &["==", "!="];
    pub const RELATIONAL: &'static [&'static str] = &["<", ">", "<=", ">="];
}

/// Machine representation of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Tagged small integer.
    Smi,
    Int64,
    Double,
}

impl Representation {
    pub fn binary_op_tag(&self) -> &'static str {
        match self {
            Self::Smi => "BinarySmiOp",
            Self::Int64 => "BinaryInt64Op",
            Self::Double => "BinaryDoubleOp",
        }
    }

    /// Tag of the instruction boxing this representation.
    ///
    /// Small integers are already tagged and are never boxed;
    ///   they share the tag of [`Representation::Int64`].
    pub fn box_tag(&self) -> &'static str {
        match self {
            Self::Smi | Self::Int64 => "BoxInt64",
            Self::Double => "BoxDouble",
        }
    }

    pub fn unbox_tag(&self) -> &'static str {
        match self {
            Self::Smi | Self::Int64 => "UnboxInt64",
            Self::Double => "UnboxDouble",
        }
    }

    /// Whether `op` is defined for operands of this representation.
    pub fn supports(&self, op: BinaryOpKind) -> bool {
        use BinaryOpKind::*;

        match self {
            Self::Double => matches!(op, Add | Sub | Mul | Div),
            Self::Smi | Self::Int64 => op != Div,
        }
    }
}

/// Argument shape of a call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallArgs {
    /// Number of type arguments passed,
    ///   or `0` if none.
    pub type_args_len: u32,

    /// Names of the trailing named arguments.
    pub args_names: Vec<SymbolId>,
}

/// Inline cache state of an instance call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ICData {
    num_args_tested: usize,
    entries: Vec<ICEntry>,
}

impl ICData {
    /// An empty cache testing the class ids of the first
    ///   `num_args_tested` arguments,
    ///     if that number is supported.
    pub fn new(num_args_tested: usize) -> Option<Self> {
        (1..=global::MAX_IC_ARGS_TESTED)
            .contains(&num_args_tested)
            .then(|| Self {
                num_args_tested,
                entries: Vec::new(),
            })
    }

    pub fn num_args_tested(&self) -> usize {
        self.num_args_tested
    }

    pub fn entries(&self) -> &[ICEntry] {
        &self.entries
    }

    /// Record a cache entry,
    ///   returning it back if its number of class ids does not match
    ///   [`ICData::num_args_tested`].
    pub fn add_entry(&mut self, entry: ICEntry) -> Result<(), ICEntry> {
        if entry.cids.len() != self.num_args_tested {
            return Err(entry);
        }

        self.entries.push(entry);
        Ok(())
    }
}

/// Observed receiver (and argument) classes and the function they
///   dispatched to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ICEntry {
    pub cids: ArrayVec<ClassId, { global::MAX_IC_ARGS_TESTED }>,
    pub target: FunctionId,
    pub count: i64,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        program::{MemberKind, Owner, Program},
        sym::GlobalSymbolIntern,
    };

    #[test]
    fn range_bounds_are_ordered() {
        use RangeBoundary::*;

        assert!(Range::new(NegInf, PosInf).is_some());
        assert!(Range::new(Const(-5), Const(-5)).is_some());
        assert!(Range::new(Const(1), Const(0)).is_none());
        assert!(Range::new(PosInf, PosInf).is_none());
        assert!(Range::new(NegInf, NegInf).is_none());
        assert!(Range::new(Const(i64::MAX), PosInf).is_some());
    }

    #[test]
    fn symbolic_names_round_trip() {
        for name in BinaryOpKind::NAMES {
            assert_eq!(
                Some(*name),
                BinaryOpKind::parse(name).map(|op| op.name())
            );
        }

        assert_eq!(Some(ComparisonKind::Le), ComparisonKind::parse("<="));
        assert_eq!(None, ComparisonKind::parse("=<"));
        assert_eq!("Array_length", NativeSlot::ArrayLength.to_string());
    }

    #[test]
    fn double_ops_are_restricted() {
        assert!(Representation::Double.supports(BinaryOpKind::Div));
        assert!(!Representation::Double.supports(BinaryOpKind::Shl));
        assert!(!Representation::Smi.supports(BinaryOpKind::Div));
        assert!(Representation::Int64.supports(BinaryOpKind::TruncDiv));
    }

    #[test]
    fn ic_entries_match_args_tested() {
        assert!(ICData::new(0).is_none());
        assert!(ICData::new(global::MAX_IC_ARGS_TESTED + 1).is_none());

        let mut program = Program::new();
        let lib = program.add_library("file:///a.dart".intern());
        let target = program
            .add_function(Owner::Library(lib), "f".intern(), MemberKind::Method, true)
            .unwrap();

        let mut ic = ICData::new(1).unwrap();

        let mut cids = ArrayVec::new();
        cids.push(ClassId::new(3));
        cids.push(ClassId::new(5));

        let two = ICEntry {
            cids,
            target,
            count: 1,
        };

        assert_eq!(Err(two.clone()), ic.add_entry(two));
        assert!(ic.entries().is_empty());
    }
}
