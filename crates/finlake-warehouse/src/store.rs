//! Scoped `DuckDB` store handles.
//!
//! A [`StoreHandle`] owns exactly one connection to the store file. Dropping
//! or closing the handle releases the file, which the loader relies on before
//! it deletes and recreates the store.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use ::duckdb::{Config, Connection};

/// Access mode for store connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access, used by query execution.
    ReadOnly,
    /// Read-write access, used by the loader during a rebuild.
    ReadWrite,
}

/// An open connection to the store file.
pub struct StoreHandle {
    path: PathBuf,
    mode: AccessMode,
    connection: Connection,
}

impl StoreHandle {
    /// Open the store at `path`.
    ///
    /// Read-write mode creates the file when it does not exist yet; read-only
    /// mode requires an existing store.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, mode: AccessMode) -> Result<Self, ::duckdb::Error> {
        let path = path.into();
        let connection = open_connection(path.as_path(), mode)?;
        Ok(Self {
            path,
            mode,
            connection,
        })
    }

    /// Path of the store file backing this handle.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    #[must_use]
    pub const fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Close the connection and surface any error from flushing the store.
    ///
    /// # Errors
    /// Returns the error reported by `DuckDB` while closing.
    pub fn close(self) -> Result<(), ::duckdb::Error> {
        self.connection.close().map_err(|(_, error)| error)
    }
}

impl Deref for StoreHandle {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn open_connection(path: &Path, mode: AccessMode) -> Result<Connection, ::duckdb::Error> {
    let connection = match mode {
        AccessMode::ReadWrite => Connection::open(path)?,
        AccessMode::ReadOnly => {
            let config = Config::default().access_mode(::duckdb::AccessMode::ReadOnly)?;
            Connection::open_with_flags(path, config)?
        }
    };
    configure_connection(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}
