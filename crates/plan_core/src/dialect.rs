use sea_orm::DatabaseBackend;
use serde::{Deserialize, Serialize};

/// SQL syntax variant a statement is rendered into.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Mysql,
    Postgres,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Sqlite, Dialect::Mysql, Dialect::Postgres];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
        }
    }

    pub fn backend(self) -> DatabaseBackend {
        match self {
            Dialect::Sqlite => DatabaseBackend::Sqlite,
            Dialect::Mysql => DatabaseBackend::MySql,
            Dialect::Postgres => DatabaseBackend::Postgres,
        }
    }

    pub fn from_backend(backend: DatabaseBackend) -> Option<Self> {
        match backend {
            DatabaseBackend::Sqlite => Some(Dialect::Sqlite),
            DatabaseBackend::MySql => Some(Dialect::Mysql),
            DatabaseBackend::Postgres => Some(Dialect::Postgres),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    pub fn quote_ident(self, name: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Single-file engines only tolerate one writer; reads are serialized with writes there.
    pub fn supports_concurrent_readers(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Upper bound on bind parameters per statement.
    ///
    /// SQLite builds before 3.32 cap host parameters at 999, so that is the
    /// figure used regardless of the linked version.
    pub fn max_bind_parameters(self) -> usize {
        match self {
            Dialect::Sqlite => 999,
            Dialect::Mysql | Dialect::Postgres => 65_535,
        }
    }

    /// Rewrites `?` placeholders into the dialect's positional syntax.
    ///
    /// Question marks inside single-quoted literals are left alone.
    pub fn bind_placeholders(self, sql: &str) -> String {
        if self != Dialect::Postgres {
            return sql.to_string();
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut index = 0usize;
        let mut in_literal = false;
        for ch in sql.chars() {
            match ch {
                '\'' => {
                    in_literal = !in_literal;
                    out.push(ch);
                }
                '?' if !in_literal => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                _ => out.push(ch),
            }
        }
        out
    }
}
