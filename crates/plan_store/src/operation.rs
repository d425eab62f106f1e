//! The two shapes of work the engine accepts.
//!
//! A [`Query`] reads and returns a typed value; an [`Executable`] mutates and
//! reports whether it affected rows as expected. Both run against the
//! connection-level transaction the executor opened for them.

use std::marker::PhantomData;

use async_trait::async_trait;
use log::debug;
use sea_orm::sea_query::QueryStatementWriter;
use sea_orm::{ConnectionTrait, DatabaseTransaction, QueryResult, Statement, Value as SeaValue};

use plan_core::builder::{build_query, count_sql, delete_all_statement, insert_statement};
use plan_core::schema::{ColumnDescriptor, ColumnKind};
use plan_core::{CellValue, Dialect, PlanError, PlanResult, TableDescriptor};

use crate::config::DEFAULT_BATCH_CHUNK_ROWS;

/// Read-only work. Implementations must not mutate state.
#[async_trait]
pub trait Query: Send + Sync {
    type Output: Send + 'static;

    async fn run(&self, conn: &DatabaseTransaction) -> PlanResult<Self::Output>;
}

/// Mutating work. Returns `true` when the statement affected rows as expected.
#[async_trait]
pub trait Executable: Send + Sync {
    async fn execute(&self, conn: &DatabaseTransaction) -> PlanResult<bool>;

    /// Receives the instance's configured batch size before the work runs.
    /// Operations that were given an explicit size keep it.
    fn use_chunk_rows(&mut self, _chunk_rows: usize) {}
}

pub(crate) fn dialect_of<C: ConnectionTrait>(conn: &C) -> PlanResult<Dialect> {
    let backend = conn.get_database_backend();
    Dialect::from_backend(backend)
        .ok_or_else(|| PlanError::storage(format!("unsupported backend {backend:?}")))
}

pub(crate) async fn exec<C, S>(conn: &C, stmt: &S) -> PlanResult<u64>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let dialect = dialect_of(conn)?;
    let (sql, values) = build_query(stmt, dialect);
    let result = conn
        .execute_raw(Statement::from_sql_and_values(dialect.backend(), sql, values))
        .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn exec_sql<C>(conn: &C, sql: &str, params: Vec<SeaValue>) -> PlanResult<u64>
where
    C: ConnectionTrait,
{
    let dialect = dialect_of(conn)?;
    let sql = dialect.bind_placeholders(sql);
    let stmt = if params.is_empty() {
        Statement::from_string(dialect.backend(), sql)
    } else {
        Statement::from_sql_and_values(dialect.backend(), sql, params)
    };
    let result = conn.execute_raw(stmt).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn query_all<C, S>(conn: &C, stmt: &S) -> PlanResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let dialect = dialect_of(conn)?;
    let (sql, values) = build_query(stmt, dialect);
    let rows = conn
        .query_all_raw(Statement::from_sql_and_values(dialect.backend(), sql, values))
        .await?;
    Ok(rows)
}

pub(crate) async fn query_one_sql<C>(
    conn: &C,
    sql: &str,
    params: Vec<SeaValue>,
) -> PlanResult<Option<QueryResult>>
where
    C: ConnectionTrait,
{
    let dialect = dialect_of(conn)?;
    let sql = dialect.bind_placeholders(sql);
    let row = conn
        .query_one_raw(Statement::from_sql_and_values(dialect.backend(), sql, params))
        .await?;
    Ok(row)
}

fn read_cell(row: &QueryResult, column: &ColumnDescriptor) -> PlanResult<CellValue> {
    let name = column.name.as_str();
    let cell = match column.kind {
        ColumnKind::Int => CellValue::from(row.try_get::<Option<i32>>("", name)?),
        ColumnKind::Long => CellValue::from(row.try_get::<Option<i64>>("", name)?),
        ColumnKind::Double => CellValue::from(row.try_get::<Option<f64>>("", name)?),
        ColumnKind::Boolean => CellValue::from(row.try_get::<Option<bool>>("", name)?),
        ColumnKind::Varchar(_) => CellValue::from(row.try_get::<Option<String>>("", name)?),
    };
    Ok(cell)
}

pub fn read_row(row: &QueryResult, table: &TableDescriptor) -> PlanResult<Vec<CellValue>> {
    table
        .columns
        .iter()
        .map(|column| read_cell(row, column))
        .collect()
}

/// One statement written with `?` placeholders.
pub struct ExecStatement {
    sql: String,
    params: Vec<SeaValue>,
    expect_rows: bool,
}

impl ExecStatement {
    pub fn new(sql: impl Into<String>, params: Vec<SeaValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            expect_rows: true,
        }
    }

    /// Schema statements report success without affecting rows.
    pub fn ddl(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            expect_rows: false,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl Executable for ExecStatement {
    async fn execute(&self, conn: &DatabaseTransaction) -> PlanResult<bool> {
        let affected = exec_sql(conn, &self.sql, self.params.clone()).await?;
        Ok(!self.expect_rows || affected > 0)
    }
}

/// One statement template bound to many parameter tuples.
///
/// A single-row `INSERT ... VALUES (?, ...)` template is widened into a
/// multi-row VALUES list, one statement per chunk. Any other template runs
/// once per tuple inside the same transaction.
pub struct ExecBatchStatement {
    sql: String,
    rows: Vec<Vec<SeaValue>>,
    chunk_rows: Option<usize>,
}

impl ExecBatchStatement {
    pub fn new(sql: impl Into<String>, rows: Vec<Vec<SeaValue>>) -> Self {
        Self {
            sql: sql.into(),
            rows,
            chunk_rows: None,
        }
    }

    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = Some(chunk_rows.max(1));
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows.unwrap_or(DEFAULT_BATCH_CHUNK_ROWS)
    }

    /// The statements this batch sends, with placeholders still written as `?`.
    pub fn statements(&self, dialect: Dialect) -> PlanResult<Vec<(String, Vec<SeaValue>)>> {
        let Some(width) = self.rows.first().map(Vec::len) else {
            return Ok(Vec::new());
        };
        if let Some(bad) = self.rows.iter().position(|row| row.len() != width) {
            return Err(PlanError::invalid(format!(
                "batch tuple {bad} has {} values, expected {width}",
                self.rows[bad].len()
            )));
        }
        let Some((head, tuple)) = split_values_template(&self.sql) else {
            return Ok(self
                .rows
                .iter()
                .map(|params| (self.sql.clone(), params.clone()))
                .collect());
        };
        let per_statement = (dialect.max_bind_parameters() / width.max(1))
            .min(self.chunk_rows())
            .max(1);
        let statements = self
            .rows
            .chunks(per_statement)
            .map(|chunk| {
                let tuples = vec![tuple; chunk.len()].join(", ");
                let params: Vec<SeaValue> = chunk.iter().flatten().cloned().collect();
                (format!("{head} {tuples}"), params)
            })
            .collect();
        Ok(statements)
    }
}

/// Splits `INSERT ... VALUES (...)` into the part up to and including
/// `VALUES` and the single trailing tuple.
fn split_values_template(sql: &str) -> Option<(&str, &str)> {
    let sql = sql.trim().trim_end_matches(';').trim_end();
    let upper = sql.to_ascii_uppercase();
    if !upper.starts_with("INSERT") {
        return None;
    }
    let at = upper.rfind("VALUES")?;
    let head = sql[..at + "VALUES".len()].trim_end();
    let tuple = sql[at + "VALUES".len()..].trim();
    let inner = tuple.strip_prefix('(')?.strip_suffix(')')?;
    if inner.contains('(') || inner.contains(')') {
        return None;
    }
    Some((head, tuple))
}

#[async_trait]
impl Executable for ExecBatchStatement {
    async fn execute(&self, conn: &DatabaseTransaction) -> PlanResult<bool> {
        if self.rows.is_empty() {
            return Ok(true);
        }
        let dialect = dialect_of(conn)?;
        let statements = self.statements(dialect)?;
        let count = statements.len();
        let mut affected = 0u64;
        for (sql, params) in statements {
            affected += exec_sql(conn, &sql, params).await?;
        }
        debug!(
            "batch of {} tuples sent as {count} statements",
            self.rows.len()
        );
        Ok(affected > 0)
    }

    fn use_chunk_rows(&mut self, chunk_rows: usize) {
        self.chunk_rows.get_or_insert(chunk_rows.max(1));
    }
}

/// Multi-row insert into a described table, split so no statement exceeds
/// the dialect's bind-parameter limit or the configured chunk size.
pub struct BatchInsert {
    table: TableDescriptor,
    rows: Vec<Vec<CellValue>>,
    chunk_rows: Option<usize>,
}

impl BatchInsert {
    pub fn new(table: TableDescriptor, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            table,
            rows,
            chunk_rows: None,
        }
    }

    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = Some(chunk_rows.max(1));
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn chunk_rows(&self) -> usize {
        self.chunk_rows.unwrap_or(DEFAULT_BATCH_CHUNK_ROWS)
    }

    fn rows_per_statement(&self, dialect: Dialect) -> usize {
        let columns = self.table.columns.len().max(1);
        (dialect.max_bind_parameters() / columns)
            .min(self.chunk_rows())
            .max(1)
    }
}

#[async_trait]
impl Executable for BatchInsert {
    async fn execute(&self, conn: &DatabaseTransaction) -> PlanResult<bool> {
        if self.rows.is_empty() {
            return Ok(true);
        }
        let dialect = dialect_of(conn)?;
        let per_statement = self.rows_per_statement(dialect);
        let mut inserted = 0u64;
        for chunk in self.rows.chunks(per_statement) {
            let insert = insert_statement(&self.table, chunk)?;
            inserted += exec(conn, &insert).await?;
        }
        debug!(
            "inserted {inserted} rows into {} ({per_statement} rows per statement)",
            self.table.name
        );
        Ok(inserted == self.rows.len() as u64)
    }

    fn use_chunk_rows(&mut self, chunk_rows: usize) {
        self.chunk_rows.get_or_insert(chunk_rows.max(1));
    }
}

pub struct ClearTable {
    table: String,
}

impl ClearTable {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

#[async_trait]
impl Executable for ClearTable {
    async fn execute(&self, conn: &DatabaseTransaction) -> PlanResult<bool> {
        exec(conn, &delete_all_statement(&self.table)).await?;
        Ok(true)
    }
}

/// Every row of a described table, ordered so results compare across engines.
pub struct FetchAllRows {
    table: TableDescriptor,
}

impl FetchAllRows {
    pub fn new(table: TableDescriptor) -> Self {
        Self { table }
    }
}

#[async_trait]
impl Query for FetchAllRows {
    type Output = Vec<Vec<CellValue>>;

    async fn run(&self, conn: &DatabaseTransaction) -> PlanResult<Self::Output> {
        let select = plan_core::builder::select_all_statement(&self.table);
        let rows = query_all(conn, &select).await?;
        rows.iter().map(|row| read_row(row, &self.table)).collect()
    }
}

pub struct CountRows {
    table: String,
}

impl CountRows {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }
}

#[async_trait]
impl Query for CountRows {
    type Output = u64;

    async fn run(&self, conn: &DatabaseTransaction) -> PlanResult<u64> {
        let dialect = dialect_of(conn)?;
        let row = query_one_sql(conn, &count_sql(&self.table, dialect), Vec::new()).await?;
        let Some(row) = row else {
            return Ok(0);
        };
        let count: i64 = row.try_get("", "row_count")?;
        Ok(count.max(0) as u64)
    }
}

/// A raw select whose rows are turned into `T` by a mapping function.
pub struct QueryStatement<T, F> {
    sql: String,
    params: Vec<SeaValue>,
    map: F,
    _output: PhantomData<fn() -> T>,
}

impl<T, F> QueryStatement<T, F>
where
    F: Fn(&[QueryResult]) -> PlanResult<T> + Send + Sync,
{
    pub fn new(sql: impl Into<String>, params: Vec<SeaValue>, map: F) -> Self {
        Self {
            sql: sql.into(),
            params,
            map,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> Query for QueryStatement<T, F>
where
    T: Send + 'static,
    F: Fn(&[QueryResult]) -> PlanResult<T> + Send + Sync,
{
    type Output = T;

    async fn run(&self, conn: &DatabaseTransaction) -> PlanResult<T> {
        let dialect = dialect_of(conn)?;
        let sql = dialect.bind_placeholders(&self.sql);
        let rows = conn
            .query_all_raw(Statement::from_sql_and_values(
                dialect.backend(),
                sql,
                self.params.clone(),
            ))
            .await?;
        (self.map)(&rows)
    }
}
