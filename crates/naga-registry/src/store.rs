//! SQLite host store
//!
//! Schema is shared with existing `hosts.db` files:
//! `hosts(id, name UNIQUE, updater, children)` where `children` is a
//! comma-joined id list or `"0"` for none, and `apps(id, host, function)`
//! holding task assignments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::{debug, info};

use naga_core::registry::{creates_cycle, dedup_tasks, validate_new_host};
use naga_core::{CoreError, HostId, HostRecord, NewHost};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS hosts (
    id integer PRIMARY KEY,
    name text UNIQUE NOT NULL,
    updater text NOT NULL,
    children text
);
CREATE TABLE IF NOT EXISTS apps (
    id integer PRIMARY KEY,
    host integer NOT NULL,
    function text NOT NULL
);
";

/// Encoding of an empty children list
const NO_CHILDREN: &str = "0";

/// Errors from the SQLite store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Registry file does not exist and `init` was not requested
    #[error("registry file not found: {0}")]
    Missing(PathBuf),

    /// SQLite failure
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A `children` column that is not a comma-joined id list
    #[error("corrupt children list for host {host}: {value}")]
    CorruptChildren {
        /// Host id
        host: HostId,
        /// Stored value
        value: String,
    },

    /// Domain rule violated (unknown host, cycle, duplicate task, ...)
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Core(e) => e,
            other => CoreError::Registry(other.to_string()),
        }
    }
}

/// Encode a children list for the `children` column
#[must_use]
pub fn encode_children(children: &[HostId]) -> String {
    if children.is_empty() {
        return NO_CHILDREN.to_string();
    }
    children
        .iter()
        .map(HostId::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode the `children` column; NULL means no data and reads as empty
///
/// # Errors
/// `StoreError::CorruptChildren` when an entry is not an integer
pub fn decode_children(host: HostId, value: Option<&str>) -> Result<Vec<HostId>, StoreError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != NO_CHILDREN)
        .map(|s| {
            s.parse().map_err(|_| StoreError::CorruptChildren {
                host,
                value: value.to_string(),
            })
        })
        .collect()
}

/// Host registry backed by one SQLite connection
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open an existing registry file
    ///
    /// # Errors
    /// `StoreError::Missing` if the file does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StoreError::Missing(path.to_path_buf()));
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "registry opened");
        Ok(Self { conn })
    }

    /// Open or create a registry file and make sure the schema exists
    ///
    /// # Errors
    /// SQLite errors
    pub fn init<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %path.display(), "registry initialised");
        Ok(Self { conn })
    }

    /// Throwaway in-memory registry
    ///
    /// # Errors
    /// SQLite errors
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Every host name, in id order
    ///
    /// # Errors
    /// SQLite errors
    pub fn host_names(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT name FROM hosts ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Host by id
    ///
    /// # Errors
    /// SQLite errors or a corrupt children column
    pub fn get(&self, id: HostId) -> Result<Option<HostRecord>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT name, updater, children FROM hosts WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, updater, children)) = row else {
            return Ok(None);
        };

        Ok(Some(HostRecord {
            id,
            name,
            updater,
            tasks: self.tasks(id)?,
            children: decode_children(id, children.as_deref())?,
        }))
    }

    /// Host by name
    ///
    /// # Errors
    /// SQLite errors or a corrupt children column
    pub fn find(&self, name: &str) -> Result<Option<HostRecord>, StoreError> {
        match self.id_of(name)? {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    fn id_of(&self, name: &str) -> Result<Option<HostId>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT id FROM hosts WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn require_id(&self, name: &str) -> Result<HostId, StoreError> {
        self.id_of(name)?
            .ok_or_else(|| CoreError::HostNotFound(name.to_string()).into())
    }

    fn tasks(&self, id: HostId) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT function FROM apps WHERE host = ?1 ORDER BY id")?;
        let tasks = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(tasks)
    }

    fn children(&self, id: HostId) -> Result<Vec<HostId>, StoreError> {
        let value: Option<String> = self.conn.query_row(
            "SELECT children FROM hosts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        decode_children(id, value.as_deref())
    }

    fn all_children(&self) -> Result<HashMap<HostId, Vec<HostId>>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, children FROM hosts")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, HostId>(0)?, row.get::<_, Option<String>>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, value)| Ok::<_, StoreError>((id, decode_children(id, value.as_deref())?)))
            .collect()
    }

    fn set_children(&self, id: HostId, children: &[HostId]) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE hosts SET children = ?1 WHERE id = ?2",
            params![encode_children(children), id],
        )?;
        Ok(())
    }

    /// Register a host and its tasks
    ///
    /// # Errors
    /// `CoreError::HostAlreadyExists`, validation errors, SQLite errors
    pub fn add_host(&mut self, host: NewHost) -> Result<HostId, StoreError> {
        validate_new_host(&host)?;
        if self.id_of(&host.name)?.is_some() {
            return Err(CoreError::HostAlreadyExists(host.name).into());
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO hosts(name, updater, children) VALUES(?1, ?2, ?3)",
            params![host.name, host.updater, NO_CHILDREN],
        )?;
        let id = tx.last_insert_rowid();
        for task in dedup_tasks(&host.tasks) {
            tx.execute(
                "INSERT INTO apps(host, function) VALUES(?1, ?2)",
                params![id, task],
            )?;
        }
        tx.commit()?;

        info!(host = %host.name, id, "host added");
        Ok(id)
    }

    /// Delete a host, its tasks, and every parent's reference to it
    ///
    /// # Errors
    /// `CoreError::HostNotFound`, SQLite errors
    pub fn delete_host(&mut self, name: &str) -> Result<(), StoreError> {
        let id = self.require_id(name)?;
        let parents: Vec<(HostId, Vec<HostId>)> = self
            .all_children()?
            .into_iter()
            .filter(|(_, children)| children.contains(&id))
            .collect();

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM hosts WHERE id = ?1", params![id])?;
        tx.execute("DELETE FROM apps WHERE host = ?1", params![id])?;
        for (parent, mut children) in parents {
            children.retain(|c| *c != id);
            tx.execute(
                "UPDATE hosts SET children = ?1 WHERE id = ?2",
                params![encode_children(&children), parent],
            )?;
        }
        tx.commit()?;

        info!(host = name, id, "host deleted");
        Ok(())
    }

    /// Assign a task to a host
    ///
    /// # Errors
    /// `CoreError::HostNotFound`, `CoreError::TaskAlreadyAssigned`, SQLite errors
    pub fn assign_task(&mut self, name: &str, task: &str) -> Result<(), StoreError> {
        let id = self.require_id(name)?;
        if self.tasks(id)?.iter().any(|t| t == task) {
            return Err(CoreError::TaskAlreadyAssigned {
                host: name.to_string(),
                task: task.to_string(),
            }
            .into());
        }
        self.conn.execute(
            "INSERT INTO apps(host, function) VALUES(?1, ?2)",
            params![id, task],
        )?;
        debug!(host = name, task, "task assigned");
        Ok(())
    }

    /// Remove a task from a host
    ///
    /// # Errors
    /// `CoreError::HostNotFound`, `CoreError::TaskNotAssigned`, SQLite errors
    pub fn remove_task(&mut self, name: &str, task: &str) -> Result<(), StoreError> {
        let id = self.require_id(name)?;
        let removed = self.conn.execute(
            "DELETE FROM apps WHERE host = ?1 AND function = ?2",
            params![id, task],
        )?;
        if removed == 0 {
            return Err(CoreError::TaskNotAssigned {
                host: name.to_string(),
                task: task.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Link `child` under `parent`, refusing self-links and cycles
    ///
    /// # Errors
    /// `CoreError` rule violations, SQLite errors
    pub fn add_child(&mut self, parent: &str, child: &str) -> Result<(), StoreError> {
        let parent_id = self.require_id(parent)?;
        let child_id = self.require_id(child)?;
        if parent_id == child_id {
            return Err(CoreError::SelfLink(parent.to_string()).into());
        }

        let graph = self.all_children()?;
        let mut children = graph.get(&parent_id).cloned().unwrap_or_default();
        if children.contains(&child_id) {
            return Err(CoreError::ChildAlreadyLinked {
                parent: parent.to_string(),
                child: child.to_string(),
            }
            .into());
        }
        if creates_cycle(parent_id, child_id, |id| {
            graph.get(&id).cloned().unwrap_or_default()
        }) {
            return Err(CoreError::Cycle {
                parent: parent.to_string(),
                child: child.to_string(),
            }
            .into());
        }

        children.push(child_id);
        self.set_children(parent_id, &children)?;
        debug!(parent, child, "child linked");
        Ok(())
    }

    /// Unlink `child` from `parent`
    ///
    /// # Errors
    /// `CoreError::HostNotFound`, `CoreError::NotAChild`, SQLite errors
    pub fn remove_child(&mut self, parent: &str, child: &str) -> Result<(), StoreError> {
        let parent_id = self.require_id(parent)?;
        let child_id = self.require_id(child)?;
        let mut children = self.children(parent_id)?;
        if !children.contains(&child_id) {
            return Err(CoreError::NotAChild {
                parent: parent.to_string(),
                child: child.to_string(),
            }
            .into());
        }
        children.retain(|c| *c != child_id);
        self.set_children(parent_id, &children)?;
        Ok(())
    }
}
