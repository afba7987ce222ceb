//! Append-only change journal for [`MemoryDirectory`](crate::MemoryDirectory).
//!
//! Every write is recorded as one JSON line and fsynced before the write is
//! applied in memory. Reopening the directory replays the journal.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use bastion_types::{
    AdminPermission, AdminRole, GraphKind, OrgUnit, OrgUnitKind, OrgUnitName, Permission,
    PermissionKey, Role, RoleName, SdSet, User, UserAdminRole, UserId, UserRole,
};
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, Result};

/// A single directory write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryChange {
    StoreUser(User),
    RemoveUser(UserId),
    StoreRole(Role),
    RemoveRole(RoleName),
    StoreAdminRole(AdminRole),
    RemoveAdminRole(RoleName),
    StoreOrgUnit(OrgUnit),
    RemoveOrgUnit(OrgUnitKind, OrgUnitName),
    StoreUserRole(UserRole),
    RemoveUserRole(UserId, RoleName),
    StoreUserAdminRole(UserAdminRole),
    RemoveUserAdminRole(UserId, RoleName),
    StoreSdSet(SdSet),
    RemoveSdSet(String),
    StoreEdge {
        kind: GraphKind,
        parent: String,
        child: String,
    },
    RemoveEdge {
        kind: GraphKind,
        parent: String,
        child: String,
    },
    StorePermission(Permission),
    RemovePermission(PermissionKey),
    StoreAdminPermission(AdminPermission),
    RemoveAdminPermission(PermissionKey),
}

/// A journaled change with its sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub seq: u64,
    pub change: DirectoryChange,
}

/// JSON-lines journal of directory changes.
#[derive(Debug)]
pub struct ChangeJournal {
    path: PathBuf,
    file: File,
    next_seq: u64,
}

impl ChangeJournal {
    /// Opens or creates a journal at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let next_seq = if path.exists() {
            Self::read_entries(&path)?
                .last()
                .map_or(0, |entry| entry.seq + 1)
        } else {
            0
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                DirectoryError::JournalError(format!("failed to open journal for writing: {e}"))
            })?;

        Ok(Self {
            path,
            file,
            next_seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a change and syncs it to disk.
    pub fn append(&mut self, change: &DirectoryChange) -> Result<u64> {
        let entry = JournalEntry {
            seq: self.next_seq,
            change: change.clone(),
        };

        let line = serde_json::to_string(&entry).map_err(|e| {
            DirectoryError::JournalError(format!("failed to serialize change: {e}"))
        })?;

        writeln!(self.file, "{line}")
            .map_err(|e| DirectoryError::JournalError(format!("failed to write change: {e}")))?;

        self.file
            .sync_all()
            .map_err(|e| DirectoryError::JournalError(format!("fsync failed: {e}")))?;

        self.next_seq += 1;
        Ok(entry.seq)
    }

    /// Reads every entry in sequence order.
    pub fn replay(&self) -> Result<Vec<JournalEntry>> {
        Self::read_entries(&self.path)
    }

    fn read_entries(path: &Path) -> Result<Vec<JournalEntry>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path).map_err(|e| {
            DirectoryError::JournalError(format!("failed to open journal for replay: {e}"))
        })?;

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| {
                DirectoryError::JournalError(format!("failed to read journal line: {e}"))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str::<JournalEntry>(&line).map_err(|e| {
                DirectoryError::JournalError(format!("failed to parse journal entry: {e}"))
            })?;
            entries.push(entry);
        }

        entries.sort_by_key(|entry| entry.seq);
        Ok(entries)
    }
}
