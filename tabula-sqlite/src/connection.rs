//! The SQLite driver.

use rusqlite::Connection;
use tabula_query::{BoundParam, Driver, DriverError, Execution, RawRow, sanitize_identifier};
use tracing::{debug, instrument, trace, warn};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types::{from_sqlite, to_sqlite};

/// A statement validated against the connection, ready to execute.
#[derive(Debug, Clone)]
pub struct Prepared {
    sql: String,
    params: Vec<BoundParam>,
}

impl Prepared {
    /// The statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A [`Driver`] over one SQLite connection.
#[derive(Debug)]
pub struct SqliteDriver {
    conn: Connection,
    last_error: Option<String>,
}

impl SqliteDriver {
    /// Open a connection and apply the configured pragmas.
    pub fn open(config: &SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory()?,
            DatabasePath::File(path) => Connection::open(path)?,
        };
        conn.set_prepared_statement_cache_capacity(config.statement_cache);
        conn.execute_batch(&config.init_sql())?;
        debug!(path = ?config.path, "sqlite connection opened");

        Ok(Self {
            conn,
            last_error: None,
        })
    }

    /// Open a connection from a URL such as `sqlite::memory:`.
    pub fn open_url(url: &str) -> SqliteResult<Self> {
        Self::open(&SqliteConfig::from_url(url)?)
    }

    /// Open an in-memory database.
    pub fn memory() -> SqliteResult<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Run a batch of statements without parameters, e.g. schema setup.
    pub fn execute_batch(&mut self, sql: &str) -> SqliteResult<()> {
        self.conn.execute_batch(sql).map_err(SqliteError::from)
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn fail(&mut self, err: SqliteError, sql: &str) -> DriverError {
        let err = DriverError::from(err).with_sql(sql);
        warn!(error = %err, "sqlite statement failed");
        self.last_error = Some(err.message.clone());
        err
    }
}

fn run_prepared(conn: &Connection, prepared: &Prepared) -> SqliteResult<Execution> {
    let mut stmt = conn.prepare_cached(&prepared.sql)?;
    for (index, param) in prepared.params.iter().enumerate() {
        stmt.raw_bind_parameter(index + 1, to_sqlite(param))?;
    }

    if stmt.column_count() > 0 {
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(from_sqlite))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(RawRow {
                columns: columns.clone(),
                values,
            });
        }
        return Ok(Execution::Rows(out));
    }

    let count = stmt.raw_execute()?;
    let is_insert = prepared
        .sql
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"));
    let last_insert_id = is_insert.then(|| conn.last_insert_rowid()).filter(|id| *id > 0);

    Ok(Execution::Affected {
        count: count as u64,
        last_insert_id,
    })
}

impl Driver for SqliteDriver {
    type Statement = Prepared;

    fn prepare(&mut self, sql: &str, params: &[BoundParam]) -> Result<Prepared, DriverError> {
        let expected = self.conn.prepare_cached(sql).map(|stmt| stmt.parameter_count());
        let expected = match expected {
            Ok(expected) => expected,
            Err(err) => return Err(self.fail(err.into(), sql)),
        };
        if expected != params.len() {
            return Err(self.fail(
                SqliteError::ParameterCount {
                    expected,
                    given: params.len(),
                },
                sql,
            ));
        }

        self.last_error = None;
        Ok(Prepared {
            sql: sql.to_string(),
            params: params.to_vec(),
        })
    }

    #[instrument(level = "trace", skip_all, fields(sql = %statement.sql, param_count = statement.params.len()))]
    fn execute(&mut self, statement: Prepared) -> Result<Execution, DriverError> {
        match run_prepared(&self.conn, &statement) {
            Ok(execution) => {
                trace!(affected = execution.affected(), "statement executed");
                Ok(execution)
            }
            Err(err) => Err(self.fail(err, &statement.sql)),
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn introspect_columns(&mut self, table: &str) -> Result<Vec<String>, DriverError> {
        let sql = format!("PRAGMA table_info({})", sanitize_identifier(table));
        let columns = self
            .conn
            .prepare(&sql)
            .and_then(|mut stmt| {
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(1))?
                    .collect::<Result<Vec<_>, _>>();
                names
            })
            .map_err(SqliteError::from);

        match columns {
            Ok(columns) => {
                debug!(table, count = columns.len(), "columns introspected");
                Ok(columns)
            }
            Err(err) => Err(self.fail(err, &sql)),
        }
    }
}
