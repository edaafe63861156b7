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

//! Exclusive access to shared program state.
//!
//! Most of a flow graph is private to the deserialization that builds it,
//!   but a few operations mutate state owned by the [`Program`]
//!     (e.g. widening a field's guarded class id when a constant
//!       instance initializes that field).
//! Other threads may be reading that state concurrently,
//!   and so such a mutation must be performed while all other mutators
//!   are paused.
//!
//! Mutators hold a shared [`MutatorGuard`] while reading program state.
//! A [`PauseGuard`] is exclusive;
//!   acquiring one waits for every [`MutatorGuard`] to be released and
//!   prevents new ones from being acquired until it is dropped.
//! Operations requiring exclusive access take a `&PauseGuard` as a
//!   witness,
//!     so that the requirement is enforced by the type system rather than
//!     by checking thread identity at runtime.
//!
//! Pauses should be scoped as narrowly as possible:
//!   around the specific mutation,
//!   never around an entire deserialization.
//!
//! [`Program`]: super::Program

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Coordination point between mutators of a program.
#[derive(Debug, Default)]
pub struct Safepoint {
    lock: RwLock<()>,
}

/// Shared access held by a running mutator.
#[must_use]
pub struct MutatorGuard<'a>(RwLockReadGuard<'a, ()>);

/// Exclusive access to program state;
///   all other mutators are paused until this is dropped.
#[must_use]
pub struct PauseGuard<'a>(RwLockWriteGuard<'a, ()>);

impl Safepoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the current thread as a running mutator.
    ///
    /// A thread holding a [`MutatorGuard`] must not attempt to
    ///   [`pause`](Safepoint::pause) the same safepoint,
    ///     which would deadlock.
    pub fn enter(&self) -> MutatorGuard {
        MutatorGuard(self.lock.read())
    }

    /// Pause all other mutators,
    ///   blocking until they have released their [`MutatorGuard`]s.
    pub fn pause(&self) -> PauseGuard {
        PauseGuard(self.lock.write())
    }
}
