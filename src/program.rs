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

//! Program object model.
//!
//! A flow graph belongs to a function of some program,
//!   and refers to other entities of that program
//!     (classes, fields, and functions)
//!   by [canonical name](name).
//! The deserializer resolves those names through the [`ProgramModel`]
//!   trait,
//!     and the serializer uses the same trait to name them again.
//!
//! [`Program`] is an in-memory implementation of [`ProgramModel`],
//!   populated either programmatically or from an S-expression
//!   (see [`load`]).
//! Every [`Program`] begins with a core library `dart:core` holding the
//!   predefined classes enumerated in [`cid`].
//!
//! ```
//! use ilsexp::program::{cid, CanonicalName, MemberKind, Owner, Program, ProgramModel};
//! use ilsexp::sym::GlobalSymbolIntern;
//!
//! let mut program = Program::new();
//! let lib = program.add_library("file:///main.dart".intern());
//! let foo = program.add_class(lib, "Foo".intern(), None)?;
//! program.add_function(Owner::Class(foo), "bar".intern(), MemberKind::Getter, false)?;
//!
//! assert!(foo.as_u32() >= cid::NUM_PREDEFINED);
//! assert_eq!(Ok(foo), program.resolve_class("file:///main.dart::Foo"));
//! assert!(program.resolve_function("file:///main.dart::Foo:get:bar").is_ok());
//! assert!(program.resolve_function("file:///main.dart::Foo:bar").is_err());
//! # Ok::<(), ilsexp::program::ProgramError>(())
//! ```

pub mod load;
pub mod name;
pub mod safepoint;

pub use load::LoadError;
pub use name::{CanonicalName, CanonicalNameError, MemberKind};
pub use safepoint::{MutatorGuard, PauseGuard, Safepoint};

use crate::{
    fmt::{DisplayWrapper, TtQuote},
    global,
    sym::{GlobalSymbolIntern, SymbolId},
};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::{error::Error, fmt::Display};

/// Identifier of a class.
///
/// Class ids are dense;
///   ids below [`cid::NUM_PREDEFINED`] are reserved for the predefined
///   classes of the core library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(global::ClassIdSize);

impl ClassId {
    pub const fn new(id: global::ClassIdSize) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> global::ClassIdSize {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Class ids of predefined classes.
pub mod cid {
    use super::ClassId;

    pub const NULL: ClassId = ClassId::new(1);
    pub const BOOL: ClassId = ClassId::new(2);
    pub const SMI: ClassId = ClassId::new(3);
    pub const MINT: ClassId = ClassId::new(4);
    pub const DOUBLE: ClassId = ClassId::new(5);
    pub const STRING: ClassId = ClassId::new(6);
    pub const IMMUTABLE_LIST: ClassId = ClassId::new(7);
    pub const TYPE: ClassId = ClassId::new(8);
    pub const TYPE_REF: ClassId = ClassId::new(9);
    pub const TYPE_PARAMETER: ClassId = ClassId::new(10);
    pub const TYPE_ARGUMENTS: ClassId = ClassId::new(11);
    pub const CLOSURE: ClassId = ClassId::new(12);
    pub const SENTINEL: ClassId = ClassId::new(13);
    pub const CLASS: ClassId = ClassId::new(14);
    pub const FIELD: ClassId = ClassId::new(15);
    pub const FUNCTION: ClassId = ClassId::new(16);
    pub const OBJECT: ClassId = ClassId::new(17);
    pub const DYNAMIC: ClassId = ClassId::new(18);

    /// First class id available to user classes.
    pub const NUM_PREDEFINED: u32 = 20;

    /// Library containing the predefined classes.
    pub const CORE_LIBRARY: &str = "dart:core";

    pub(super) const PREDEFINED: [(ClassId, &str); 18] = [
        (NULL, "Null"),
        (BOOL, "bool"),
        (SMI, "_Smi"),
        (MINT, "_Mint"),
        (DOUBLE, "_Double"),
        (STRING, "_OneByteString"),
        (IMMUTABLE_LIST, "_ImmutableList"),
        (TYPE, "_Type"),
        (TYPE_REF, "_TypeRef"),
        (TYPE_PARAMETER, "_TypeParameter"),
        (TYPE_ARGUMENTS, "_TypeArguments"),
        (CLOSURE, "_Closure"),
        (SENTINEL, "_Sentinel"),
        (CLASS, "_Class"),
        (FIELD, "_Field"),
        (FUNCTION, "_Function"),
        (OBJECT, "Object"),
        (DYNAMIC, "dynamic"),
    ];

    /// Whether `cid` is a class of integer instances.
    pub fn is_integer(cid: ClassId) -> bool {
        cid == SMI || cid == MINT
    }

    /// Whether values of class `actual` may be stored where class
    ///   `expected` is declared.
    pub fn is_compatible(expected: ClassId, actual: ClassId) -> bool {
        expected == actual
            || expected == OBJECT
            || expected == DYNAMIC
            || (is_integer(expected) && is_integer(actual))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionId(u32);

#[derive(Debug)]
pub struct Library {
    url: SymbolId,
    classes: Vec<ClassId>,
    fields: Vec<FieldId>,
    functions: Vec<FunctionId>,
}

impl Library {
    pub fn url(&self) -> SymbolId {
        self.url
    }

    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }

    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    pub fn functions(&self) -> &[FunctionId] {
        &self.functions
    }
}

#[derive(Debug)]
pub struct Class {
    cid: ClassId,
    library: LibraryId,
    name: SymbolId,
    fields: Vec<FieldId>,
    functions: Vec<FunctionId>,
}

impl Class {
    pub fn cid(&self) -> ClassId {
        self.cid
    }

    pub fn library(&self) -> LibraryId {
        self.library
    }

    pub fn name(&self) -> SymbolId {
        self.name
    }

    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    pub fn functions(&self) -> &[FunctionId] {
        &self.functions
    }
}

/// Entity to which a member belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Top-level member of a library.
    Library(LibraryId),
    Class(ClassId),
}

/// Declaration of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldSpec {
    pub is_final: bool,
    pub is_static: bool,

    /// Class id that every value of this field is statically known to
    ///   have,
    ///     if any.
    pub static_cid: Option<ClassId>,
}

#[derive(Debug)]
pub struct Field {
    owner: Owner,
    name: SymbolId,
    spec: FieldSpec,
}

impl Field {
    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn name(&self) -> SymbolId {
        self.name
    }

    pub fn is_final(&self) -> bool {
        self.spec.is_final
    }

    pub fn is_static(&self) -> bool {
        self.spec.is_static
    }

    pub fn static_cid(&self) -> Option<ClassId> {
        self.spec.static_cid
    }
}

#[derive(Debug)]
pub struct Function {
    owner: Owner,
    name: SymbolId,
    kind: MemberKind,
    is_static: bool,
}

impl Function {
    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn name(&self) -> SymbolId {
        self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }
}

/// Class ids observed to be stored into a field.
///
/// A guard only ever widens:
///   from [`FieldGuard::Unknown`] to a single class id,
///   and from there to [`FieldGuard::Dynamic`] once a second class id is
///   observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldGuard {
    #[default]
    Unknown,
    Cid(ClassId),
    Dynamic,
}

impl FieldGuard {
    pub fn widen(self, cid: ClassId) -> Self {
        match self {
            Self::Unknown => Self::Cid(cid),
            Self::Cid(guarded) if guarded == cid => self,
            Self::Cid(_) | Self::Dynamic => Self::Dynamic,
        }
    }
}

/// Resolution of program entities.
///
/// This is the interface through which flow graphs are linked to the
///   program that contains them.
pub trait ProgramModel {
    fn lookup_class(&self, name: &CanonicalName) -> Result<ClassId, CanonicalNameError>;
    fn lookup_field(&self, name: &CanonicalName) -> Result<FieldId, CanonicalNameError>;
    fn lookup_function(
        &self,
        name: &CanonicalName,
    ) -> Result<FunctionId, CanonicalNameError>;

    /// Whether `cid` identifies a class of this program.
    fn is_valid_cid(&self, cid: ClassId) -> bool;

    fn class(&self, cid: ClassId) -> Option<&Class>;
    fn field(&self, id: FieldId) -> &Field;
    fn function(&self, id: FunctionId) -> &Function;

    fn class_name(&self, cid: ClassId) -> Option<CanonicalName>;
    fn field_name(&self, id: FieldId) -> CanonicalName;
    fn function_name(&self, id: FunctionId) -> CanonicalName;

    fn field_guard(&self, id: FieldId) -> FieldGuard;

    /// Record that a value of class `cid` has been stored into the field
    ///   `id`,
    ///     returning the resulting guard.
    ///
    /// This mutates state shared with other mutators and so requires that
    ///   they be paused.
    fn widen_field_guard(
        &self,
        id: FieldId,
        cid: ClassId,
        pause: &PauseGuard,
    ) -> FieldGuard;

    fn safepoint(&self) -> &Safepoint;

    /// Fields declared by the class `cid`.
    fn class_fields(&self, cid: ClassId) -> &[FieldId] {
        self.class(cid).map(Class::fields).unwrap_or(&[])
    }

    /// Functions declared by the class `cid`.
    fn class_functions(&self, cid: ClassId) -> &[FunctionId] {
        self.class(cid).map(Class::functions).unwrap_or(&[])
    }

    fn resolve_class(&self, name: &str) -> Result<ClassId, CanonicalNameError> {
        self.lookup_class(&CanonicalName::parse(name)?)
    }

    fn resolve_field(&self, name: &str) -> Result<FieldId, CanonicalNameError> {
        self.lookup_field(&CanonicalName::parse(name)?)
    }

    fn resolve_function(
        &self,
        name: &str,
    ) -> Result<FunctionId, CanonicalNameError> {
        self.lookup_function(&CanonicalName::parse(name)?)
    }
}

/// In-memory program.
///
/// See the [module-level documentation](self) for more information.
#[derive(Debug)]
pub struct Program {
    libraries: Vec<Library>,
    library_index: FxHashMap<SymbolId, LibraryId>,

    /// Classes indexed by [`ClassId`];
    ///   reserved and unallocated ids are [`None`].
    classes: Vec<Option<Class>>,

    fields: Vec<Field>,
    functions: Vec<Function>,

    /// Guards indexed by [`FieldId`].
    guards: RwLock<Vec<FieldGuard>>,

    safepoint: Safepoint,
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl Program {
    /// A program containing only the core library.
    pub fn new() -> Self {
        let mut program = Self {
            libraries: Vec::new(),
            library_index: FxHashMap::default(),
            classes: Vec::new(),
            fields: Vec::new(),
            functions: Vec::new(),
            guards: RwLock::new(Vec::new()),
            safepoint: Safepoint::new(),
        };

        let core = program.add_library(cid::CORE_LIBRARY.intern());

        for (cid, name) in cid::PREDEFINED {
            program.insert_class(core, name.intern(), cid);
        }

        program
    }

    /// Add a library,
    ///   or retrieve the existing library having the given `url`.
    pub fn add_library(&mut self, url: SymbolId) -> LibraryId {
        if let Some(&id) = self.library_index.get(&url) {
            return id;
        }

        let id = LibraryId(self.libraries.len() as u32);

        self.libraries.push(Library {
            url,
            classes: Vec::new(),
            fields: Vec::new(),
            functions: Vec::new(),
        });
        self.library_index.insert(url, id);

        id
    }

    pub fn library(&self, id: LibraryId) -> &Library {
        &self.libraries[id.0 as usize]
    }

    pub fn lookup_library(&self, url: SymbolId) -> Option<LibraryId> {
        self.library_index.get(&url).copied()
    }

    /// Add a class to the library `lib`.
    ///
    /// If `cid` is [`None`],
    ///   the next available user class id is allocated.
    pub fn add_class(
        &mut self,
        lib: LibraryId,
        name: SymbolId,
        cid: Option<ClassId>,
    ) -> Result<ClassId, ProgramError> {
        let cname = CanonicalName::class_name(self.library(lib).url, name);

        if self.find_class(lib, name).is_some() {
            return Err(ProgramError::DuplicateDefinition(cname));
        }

        let cid = match cid {
            Some(cid) if cid.as_u32() < cid::NUM_PREDEFINED => {
                return Err(ProgramError::ReservedCid(cid))
            }
            Some(cid) if self.is_valid_cid(cid) => {
                return Err(ProgramError::CidInUse(cid))
            }
            Some(cid) => cid,
            None => ClassId::new(
                (self.classes.len() as u32).max(cid::NUM_PREDEFINED),
            ),
        };

        self.insert_class(lib, name, cid);
        Ok(cid)
    }

    fn insert_class(&mut self, lib: LibraryId, name: SymbolId, cid: ClassId) {
        if self.classes.len() <= cid.as_usize() {
            self.classes.resize_with(cid.as_usize() + 1, || None);
        }

        self.classes[cid.as_usize()] = Some(Class {
            cid,
            library: lib,
            name,
            fields: Vec::new(),
            functions: Vec::new(),
        });

        self.libraries[lib.0 as usize].classes.push(cid);
    }

    pub fn add_field(
        &mut self,
        owner: Owner,
        name: SymbolId,
        spec: FieldSpec,
    ) -> Result<FieldId, ProgramError> {
        let fields = self.owner_fields(owner)?;

        if fields.iter().any(|&id| self.field(id).name == name) {
            return Err(ProgramError::DuplicateDefinition(
                self.member_name(owner, MemberKind::Field, name),
            ));
        }

        let id = FieldId(self.fields.len() as u32);
        self.fields.push(Field { owner, name, spec });
        self.guards.get_mut().push(FieldGuard::default());

        match owner {
            Owner::Library(lib) => self.libraries[lib.0 as usize].fields.push(id),
            Owner::Class(cid) => self.class_mut(cid)?.fields.push(id),
        }

        Ok(id)
    }

    pub fn add_function(
        &mut self,
        owner: Owner,
        name: SymbolId,
        kind: MemberKind,
        is_static: bool,
    ) -> Result<FunctionId, ProgramError> {
        if kind == MemberKind::Field {
            return Err(ProgramError::FieldKindFunction(name));
        }

        let functions = self.owner_functions(owner)?;

        if self.find_function(functions, name, kind).is_some() {
            return Err(ProgramError::DuplicateDefinition(
                self.member_name(owner, kind, name),
            ));
        }

        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(Function {
            owner,
            name,
            kind,
            is_static,
        });

        match owner {
            Owner::Library(lib) => {
                self.libraries[lib.0 as usize].functions.push(id)
            }
            Owner::Class(cid) => self.class_mut(cid)?.functions.push(id),
        }

        Ok(id)
    }

    fn class_mut(&mut self, cid: ClassId) -> Result<&mut Class, ProgramError> {
        self.classes
            .get_mut(cid.as_usize())
            .and_then(Option::as_mut)
            .ok_or(ProgramError::UnknownCid(cid))
    }

    fn owner_fields(&self, owner: Owner) -> Result<&[FieldId], ProgramError> {
        match owner {
            Owner::Library(lib) => Ok(&self.library(lib).fields),
            Owner::Class(cid) => self
                .class(cid)
                .map(Class::fields)
                .ok_or(ProgramError::UnknownCid(cid)),
        }
    }

    fn owner_functions(
        &self,
        owner: Owner,
    ) -> Result<&[FunctionId], ProgramError> {
        match owner {
            Owner::Library(lib) => Ok(&self.library(lib).functions),
            Owner::Class(cid) => self
                .class(cid)
                .map(Class::functions)
                .ok_or(ProgramError::UnknownCid(cid)),
        }
    }

    fn find_class(&self, lib: LibraryId, name: SymbolId) -> Option<ClassId> {
        self.library(lib)
            .classes
            .iter()
            .copied()
            .find(|&cid| self.class(cid).map_or(false, |c| c.name == name))
    }

    fn find_function(
        &self,
        functions: &[FunctionId],
        name: SymbolId,
        kind: MemberKind,
    ) -> Option<FunctionId> {
        functions.iter().copied().find(|&id| {
            let func = self.function(id);
            func.name == name && func.kind == kind
        })
    }

    fn owner_library(&self, owner: Owner) -> LibraryId {
        match owner {
            Owner::Library(lib) => lib,
            Owner::Class(cid) => self
                .class(cid)
                .map_or(LibraryId(0), |class| class.library),
        }
    }

    fn member_name(
        &self,
        owner: Owner,
        kind: MemberKind,
        name: SymbolId,
    ) -> CanonicalName {
        let lib = self.library(self.owner_library(owner)).url;
        let class = match owner {
            Owner::Library(_) => None,
            Owner::Class(cid) => self.class(cid).map(Class::name),
        };

        CanonicalName::member_name(lib, class, kind, name)
    }

    /// Resolve the owner of a member named by `name`.
    fn lookup_owner(&self, name: &CanonicalName) -> Result<Owner, CanonicalNameError> {
        match name.class() {
            None => self
                .lookup_library(name.library())
                .map(Owner::Library)
                .ok_or(CanonicalNameError::UnknownLibrary(name.library())),
            Some(class) => self
                .lookup_class(&CanonicalName::class_name(name.library(), class))
                .map(Owner::Class),
        }
    }
}

impl ProgramModel for Program {
    fn lookup_class(&self, name: &CanonicalName) -> Result<ClassId, CanonicalNameError> {
        let class = match (name.is_class(), name.class()) {
            (true, Some(class)) => class,
            _ => return Err(CanonicalNameError::ExpectedClass(*name)),
        };

        let lib = self
            .lookup_library(name.library())
            .ok_or(CanonicalNameError::UnknownLibrary(name.library()))?;

        self.find_class(lib, class)
            .ok_or(CanonicalNameError::UnknownClass(*name))
    }

    fn lookup_field(&self, name: &CanonicalName) -> Result<FieldId, CanonicalNameError> {
        let ident = match (name.member_kind(), name.member()) {
            (Some(MemberKind::Field), Some(ident)) => ident,
            _ => return Err(CanonicalNameError::ExpectedField(*name)),
        };

        let owner = self.lookup_owner(name)?;

        self.owner_fields(owner)
            .unwrap_or(&[])
            .iter()
            .copied()
            .find(|&id| self.field(id).name == ident)
            .ok_or(CanonicalNameError::UnknownField(*name))
    }

    fn lookup_function(
        &self,
        name: &CanonicalName,
    ) -> Result<FunctionId, CanonicalNameError> {
        let (kind, ident) = match (name.member_kind(), name.member()) {
            (Some(kind), Some(ident)) if kind != MemberKind::Field => {
                (kind, ident)
            }
            _ => return Err(CanonicalNameError::ExpectedFunction(*name)),
        };

        let owner = self.lookup_owner(name)?;
        let functions = self.owner_functions(owner).unwrap_or(&[]);

        self.find_function(functions, ident, kind)
            .ok_or(CanonicalNameError::UnknownFunction(*name))
    }

    fn is_valid_cid(&self, cid: ClassId) -> bool {
        self.class(cid).is_some()
    }

    fn class(&self, cid: ClassId) -> Option<&Class> {
        self.classes.get(cid.as_usize()).and_then(Option::as_ref)
    }

    fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0 as usize]
    }

    fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.0 as usize]
    }

    fn class_name(&self, cid: ClassId) -> Option<CanonicalName> {
        self.class(cid).map(|class| {
            CanonicalName::class_name(self.library(class.library).url, class.name)
        })
    }

    fn field_name(&self, id: FieldId) -> CanonicalName {
        let field = self.field(id);
        self.member_name(field.owner, MemberKind::Field, field.name)
    }

    fn function_name(&self, id: FunctionId) -> CanonicalName {
        let func = self.function(id);
        self.member_name(func.owner, func.kind, func.name)
    }

    fn field_guard(&self, id: FieldId) -> FieldGuard {
        self.guards.read()[id.0 as usize]
    }

    fn widen_field_guard(
        &self,
        id: FieldId,
        cid: ClassId,
        _pause: &PauseGuard,
    ) -> FieldGuard {
        let mut guards = self.guards.write();
        let guard = &mut guards[id.0 as usize];

        *guard = guard.widen(cid);
        *guard
    }

    fn safepoint(&self) -> &Safepoint {
        &self.safepoint
    }
}

/// Error while building a [`Program`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    DuplicateDefinition(CanonicalName),
    ReservedCid(ClassId),
    CidInUse(ClassId),
    UnknownCid(ClassId),
    FieldKindFunction(SymbolId),
}

impl Display for ProgramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ProgramError::*;

        match self {
            DuplicateDefinition(name) => {
                write!(f, "duplicate definition of {}", TtQuote::wrap(name))
            }
            ReservedCid(cid) => {
                write!(f, "class id {cid} is reserved for predefined classes")
            }
            CidInUse(cid) => write!(f, "class id {cid} is already in use"),
            UnknownCid(cid) => write!(f, "unknown class id {cid}"),
            FieldKindFunction(name) => write!(
                f,
                "function {} cannot be declared as a field",
                TtQuote::wrap(name)
            ),
        }
    }
}

impl Error for ProgramError {}

#[cfg(test)]
mod test;
