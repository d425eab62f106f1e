//! Renders [`TableDescriptor`]s into dialect-specific statements.
//!
//! All DDL goes through `sea-query`, so auto increment, boolean literals and
//! identifier quoting follow whichever builder matches the target dialect.

use sea_orm::sea_query::{
    Alias, ColumnDef, DeleteStatement, ForeignKey, Index, InsertStatement, MysqlQueryBuilder,
    Order, PostgresQueryBuilder, Query, QueryStatementWriter, SchemaStatementBuilder,
    SelectStatement, SqliteQueryBuilder, Table, TableCreateStatement, Values,
};

use crate::schema::{ColumnDescriptor, ColumnKind, TableDescriptor};
use crate::value::CellValue;
use crate::{Dialect, PlanError, PlanResult};

pub fn table_create_statement(table: &TableDescriptor) -> PlanResult<TableCreateStatement> {
    table.validate()?;
    let primary = table.primary_key_columns();
    let composite = primary.len() > 1;
    let mut stmt = Table::create();
    stmt.table(Alias::new(table.name.as_str())).if_not_exists();
    for column in &table.columns {
        stmt.col(column_def(column, !composite)?);
    }
    if composite {
        let mut index = Index::create();
        index.name(format!("pk_{}", table.name));
        for column in &primary {
            index.col(Alias::new(column.name.as_str()));
        }
        stmt.primary_key(&mut index);
    }
    for fk in &table.foreign_keys {
        stmt.foreign_key(
            ForeignKey::create()
                .name(format!("fk_{}_{}", table.name, fk.column))
                .from(
                    Alias::new(table.name.as_str()),
                    Alias::new(fk.column.as_str()),
                )
                .to(
                    Alias::new(fk.references_table.as_str()),
                    Alias::new(fk.references_column.as_str()),
                ),
        );
    }
    Ok(stmt)
}

pub fn create_table_sql(table: &TableDescriptor, dialect: Dialect) -> PlanResult<String> {
    let stmt = table_create_statement(table)?;
    Ok(render_schema(&stmt, dialect))
}

/// `ALTER TABLE .. ADD COLUMN` for an additive patch.
pub fn add_column_sql(
    table: &str,
    column: &ColumnDescriptor,
    dialect: Dialect,
) -> PlanResult<String> {
    if column.primary_key || column.auto_increment {
        return Err(PlanError::invalid(format!(
            "{table}.{}: key columns cannot be added to an existing table",
            column.name
        )));
    }
    if column.not_null && column.default.is_none() {
        return Err(PlanError::invalid(format!(
            "{table}.{}: added not-null column needs a default",
            column.name
        )));
    }
    let stmt = Table::alter()
        .table(Alias::new(table))
        .add_column(column_def(column, false)?)
        .to_owned();
    Ok(render_schema(&stmt, dialect))
}

pub fn drop_table_sql(table: &str, dialect: Dialect) -> String {
    let stmt = Table::drop().table(Alias::new(table)).if_exists().to_owned();
    render_schema(&stmt, dialect)
}

fn column_def(column: &ColumnDescriptor, inline_primary_key: bool) -> PlanResult<ColumnDef> {
    let mut def = ColumnDef::new(Alias::new(column.name.as_str()));
    match column.kind {
        ColumnKind::Int => {
            def.integer();
        }
        ColumnKind::Long => {
            def.big_integer();
        }
        ColumnKind::Double => {
            def.double();
        }
        ColumnKind::Boolean => {
            def.boolean();
        }
        ColumnKind::Varchar(length) => {
            def.string_len(length);
        }
    }
    if column.not_null {
        def.not_null();
    } else {
        def.null();
    }
    if column.primary_key && inline_primary_key {
        def.primary_key();
    }
    if column.auto_increment {
        def.auto_increment();
    }
    if column.unique {
        def.unique_key();
    }
    if let Some(default) = &column.default {
        def.default(default.to_value(column.kind)?);
    }
    Ok(def)
}

fn render_schema<S: SchemaStatementBuilder>(stmt: &S, dialect: Dialect) -> String {
    match dialect {
        Dialect::Sqlite => stmt.build(SqliteQueryBuilder),
        Dialect::Mysql => stmt.build(MysqlQueryBuilder),
        Dialect::Postgres => stmt.build(PostgresQueryBuilder),
    }
}

pub fn build_query<S: QueryStatementWriter>(stmt: &S, dialect: Dialect) -> (String, Values) {
    match dialect {
        Dialect::Sqlite => stmt.build(SqliteQueryBuilder),
        Dialect::Mysql => stmt.build(MysqlQueryBuilder),
        Dialect::Postgres => stmt.build(PostgresQueryBuilder),
    }
}

/// Multi-row insert of `rows`, each laid out in the table's column order.
pub fn insert_statement(
    table: &TableDescriptor,
    rows: &[Vec<CellValue>],
) -> PlanResult<InsertStatement> {
    let mut insert = Query::insert();
    insert
        .into_table(Alias::new(table.name.as_str()))
        .columns(
            table
                .columns
                .iter()
                .map(|column| Alias::new(column.name.as_str())),
        );
    for row in rows {
        if row.len() != table.columns.len() {
            return Err(PlanError::invalid(format!(
                "{}: row has {} values for {} columns",
                table.name,
                row.len(),
                table.columns.len()
            )));
        }
        let values = row
            .iter()
            .zip(&table.columns)
            .map(|(cell, column)| cell.to_value(column.kind))
            .collect::<PlanResult<Vec<_>>>()?;
        insert
            .values(values.into_iter().map(Into::into))
            .map_err(|err| PlanError::invalid(format!("{}: {err}", table.name)))?;
    }
    Ok(insert)
}

/// Select of every column, ordered by the primary key (or every column) so
/// results compare equal across engines.
pub fn select_all_statement(table: &TableDescriptor) -> SelectStatement {
    let mut select = Query::select();
    select.from(Alias::new(table.name.as_str())).columns(
        table
            .columns
            .iter()
            .map(|column| Alias::new(column.name.as_str())),
    );
    let primary = table.primary_key_columns();
    let order: Vec<&ColumnDescriptor> = if primary.is_empty() {
        table.columns.iter().collect()
    } else {
        primary
    };
    for column in order {
        select.order_by(Alias::new(column.name.as_str()), Order::Asc);
    }
    select
}

pub fn delete_all_statement(table: &str) -> DeleteStatement {
    Query::delete().from_table(Alias::new(table)).to_owned()
}

pub fn count_sql(table: &str, dialect: Dialect) -> String {
    format!(
        "SELECT COUNT(*) AS row_count FROM {}",
        dialect.quote_ident(table)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDescriptor;

    fn session_table() -> TableDescriptor {
        TableDescriptor::new("plan_sessions")
            .column(ColumnDescriptor::int("id").primary_key().auto_increment())
            .column(ColumnDescriptor::varchar("uuid", 36).not_null())
            .column(
                ColumnDescriptor::boolean("afk")
                    .not_null()
                    .default_value(false),
            )
            .foreign_key("uuid", "plan_users", "uuid")
    }

    #[test]
    fn create_table_is_idempotent_and_keyed_for_every_dialect() {
        for dialect in Dialect::ALL {
            let sql = create_table_sql(&session_table(), dialect)
                .expect("render")
                .to_lowercase();
            assert!(sql.contains("if not exists"), "{dialect:?}: {sql}");
            assert!(sql.contains("primary key"), "{dialect:?}: {sql}");
            assert!(sql.contains("references"), "{dialect:?}: {sql}");
            assert!(sql.contains("plan_users"), "{dialect:?}: {sql}");
            assert!(sql.contains("varchar(36)"), "{dialect:?}: {sql}");
        }
    }

    #[test]
    fn auto_increment_syntax_differs() {
        let sqlite = create_table_sql(&session_table(), Dialect::Sqlite)
            .expect("sqlite")
            .to_lowercase();
        let mysql = create_table_sql(&session_table(), Dialect::Mysql)
            .expect("mysql")
            .to_lowercase();
        assert!(sqlite.contains("autoincrement"), "{sqlite}");
        assert!(mysql.contains("auto_increment"), "{mysql}");
        assert!(mysql.contains('`'), "{mysql}");
    }

    #[test]
    fn composite_primary_key_is_a_table_constraint() {
        let table = TableDescriptor::new("plan_world_times")
            .column(ColumnDescriptor::int("session_id").primary_key())
            .column(ColumnDescriptor::int("world_id").primary_key());
        let sql = create_table_sql(&table, Dialect::Postgres)
            .expect("render")
            .to_lowercase();
        assert!(sql.contains("pk_plan_world_times"), "{sql}");
    }

    #[test]
    fn added_not_null_column_requires_default() {
        let column = ColumnDescriptor::long("afk_time").not_null();
        assert!(add_column_sql("plan_sessions", &column, Dialect::Sqlite).is_err());
        let column = column.default_value(0i64);
        let sql = add_column_sql("plan_sessions", &column, Dialect::Sqlite).expect("render");
        assert!(sql.to_lowercase().contains("add column"), "{sql}");
    }

    #[test]
    fn insert_rejects_short_rows() {
        let rows = vec![vec![CellValue::Int(1)]];
        assert!(insert_statement(&session_table(), &rows).is_err());
    }

    #[test]
    fn insert_binds_every_cell() {
        let rows = vec![
            vec![
                CellValue::Int(1),
                CellValue::Text("a".into()),
                CellValue::Bool(false),
            ],
            vec![
                CellValue::Int(2),
                CellValue::Text("b".into()),
                CellValue::Bool(true),
            ],
        ];
        let insert = insert_statement(&session_table(), &rows).expect("insert");
        let (sql, values) = build_query(&insert, Dialect::Postgres);
        assert!(sql.contains("$6"), "{sql}");
        assert_eq!(values.0.len(), 6);
    }

    #[test]
    fn select_all_orders_by_primary_key() {
        let select = select_all_statement(&session_table());
        let (sql, _) = build_query(&select, Dialect::Sqlite);
        assert!(sql.ends_with("ORDER BY \"id\" ASC"), "{sql}");
    }

    #[test]
    fn drop_and_count_are_quoted() {
        let sql = drop_table_sql("plan_transfer", Dialect::Mysql);
        assert!(sql.to_lowercase().contains("if exists"), "{sql}");
        assert_eq!(
            count_sql("plan_tps", Dialect::Postgres),
            "SELECT COUNT(*) AS row_count FROM \"plan_tps\""
        );
    }
}
