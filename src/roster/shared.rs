//! Shared roster handle
//!
//! Wraps a `Roster` in `Arc<RwLock<_>>`. Each write (uniqueness check,
//! insert and index maintenance) runs under a single write lock; readers
//! proceed concurrently. Imports decode and rebuild outside the lock and
//! only the final swap takes the write lock.

use crate::roster::{NewCourse, NewStudent, Roster};
use crate::storage::{Enrollment, RosterError, RosterResult, Snapshot, SnapshotFormat};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe, cloneable handle to a roster
#[derive(Debug, Clone)]
pub struct SharedRoster {
    inner: Arc<RwLock<Roster>>,
}

impl SharedRoster {
    pub fn new(roster: Roster) -> Self {
        Self {
            inner: Arc::new(RwLock::new(roster)),
        }
    }

    fn read_guard(&self) -> RosterResult<RwLockReadGuard<'_, Roster>> {
        self.inner
            .read()
            .map_err(|e| RosterError::Lock(format!("Failed to acquire roster read lock: {}", e)))
    }

    fn write_guard(&self) -> RosterResult<RwLockWriteGuard<'_, Roster>> {
        self.inner
            .write()
            .map_err(|e| RosterError::Lock(format!("Failed to acquire roster write lock: {}", e)))
    }

    /// Run `f` with shared access
    pub fn read<T>(&self, f: impl FnOnce(&Roster) -> T) -> RosterResult<T> {
        let roster = self.read_guard()?;
        Ok(f(&roster))
    }

    /// Run `f` with exclusive access
    pub fn write<T>(&self, f: impl FnOnce(&mut Roster) -> RosterResult<T>) -> RosterResult<T> {
        let mut roster = self.write_guard()?;
        f(&mut roster)
    }

    pub fn add_student(&self, student: NewStudent) -> RosterResult<()> {
        self.write(|r| r.add_student(student).map(|_| ()))
    }

    pub fn add_course(&self, course: NewCourse) -> RosterResult<()> {
        self.write(|r| r.add_course(course).map(|_| ()))
    }

    pub fn enroll(&self, enrollment: Enrollment) -> RosterResult<()> {
        self.write(|r| r.enroll(enrollment))
    }

    pub fn export(&self, format: SnapshotFormat) -> RosterResult<Vec<u8>> {
        self.read(|r| r.export(format))?
    }

    /// Replace the roster with an encoded snapshot
    pub fn import(&self, format: SnapshotFormat, bytes: &[u8]) -> RosterResult<()> {
        let config = self.read(|r| r.config().clone())?;
        let snapshot = Snapshot::from_bytes(bytes, format)?;
        let roster = Roster::from_snapshot(snapshot, config)?;

        let mut guard = self.write_guard()?;
        *guard = roster;
        tracing::info!(format = %format, "Swapped in imported roster");
        Ok(())
    }

    /// Take the roster back out if this is the last handle
    pub fn try_unwrap(self) -> Result<Roster, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(lock) => lock
                .into_inner()
                .map_err(|e| Self::new(e.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }
}
