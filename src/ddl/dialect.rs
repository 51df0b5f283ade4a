//! SQL Server (T-SQL) lexical conventions: identifier and literal quoting,
//! reserved words and existence guards.

/// Batch separator understood by `sqlcmd` and SSMS.
pub const BATCH_SEPARATOR: &str = "GO";

/// Current-timestamp function used for `now` defaults.
pub const CURRENT_TIMESTAMP: &str = "GETDATE()";

/// Reserved keywords of the target dialect (upper case, sorted).
const RESERVED_WORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "ANY", "AS", "ASC", "AUTHORIZATION", "BACKUP", "BEGIN",
    "BETWEEN", "BREAK", "BROWSE", "BULK", "BY", "CASCADE", "CASE", "CHECK", "CHECKPOINT",
    "CLOSE", "CLUSTERED", "COALESCE", "COLLATE", "COLUMN", "COMMIT", "COMPUTE", "CONSTRAINT",
    "CONTAINS", "CONTAINSTABLE", "CONTINUE", "CONVERT", "CREATE", "CROSS", "CURRENT",
    "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "CURRENT_USER", "CURSOR", "DATABASE",
    "DBCC", "DEALLOCATE", "DECLARE", "DEFAULT", "DELETE", "DENY", "DESC", "DISK", "DISTINCT",
    "DISTRIBUTED", "DOUBLE", "DROP", "DUMP", "ELSE", "END", "ERRLVL", "ESCAPE", "EXCEPT", "EXEC",
    "EXECUTE", "EXISTS", "EXIT", "EXTERNAL", "FETCH", "FILE", "FILLFACTOR", "FOR", "FOREIGN",
    "FREETEXT", "FREETEXTTABLE", "FROM", "FULL", "FUNCTION", "GOTO", "GRANT", "GROUP", "HAVING",
    "HOLDLOCK", "IDENTITY", "IDENTITYCOL", "IDENTITY_INSERT", "IF", "IN", "INDEX", "INNER",
    "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "KEY", "KILL", "LEFT", "LIKE", "LINENO", "LOAD",
    "MERGE", "NATIONAL", "NOCHECK", "NONCLUSTERED", "NOT", "NULL", "NULLIF", "OF", "OFF",
    "OFFSETS", "ON", "OPEN", "OPENDATASOURCE", "OPENQUERY", "OPENROWSET", "OPENXML", "OPTION",
    "OR", "ORDER", "OUTER", "OVER", "PERCENT", "PIVOT", "PLAN", "PRECISION", "PRIMARY", "PRINT",
    "PROC", "PROCEDURE", "PUBLIC", "RAISERROR", "READ", "READTEXT", "RECONFIGURE", "REFERENCES",
    "REPLICATION", "RESTORE", "RESTRICT", "RETURN", "REVERT", "REVOKE", "RIGHT", "ROLLBACK",
    "ROWCOUNT", "ROWGUIDCOL", "RULE", "SAVE", "SCHEMA", "SECURITYAUDIT", "SELECT",
    "SEMANTICKEYPHRASETABLE", "SESSION_USER", "SET", "SETUSER", "SHUTDOWN", "SOME", "STATISTICS",
    "SYSTEM_USER", "TABLE", "TABLESAMPLE", "TEXTSIZE", "THEN", "TO", "TOP", "TRAN", "TRANSACTION",
    "TRIGGER", "TRUNCATE", "TRY_CONVERT", "TSEQUAL", "UNION", "UNIQUE", "UNPIVOT", "UPDATE",
    "UPDATETEXT", "USE", "USER", "VALUES", "VARYING", "VIEW", "WAITFOR", "WHEN", "WHERE", "WHILE",
    "WITH", "WITHIN", "WRITETEXT",
];

pub fn is_reserved(name: &str) -> bool {
    let upper = name.to_uppercase();
    RESERVED_WORDS.binary_search(&upper.as_str()).is_ok()
}

/// `[name]`, with `]` doubled.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// `[schema].[name]`.
pub fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

/// String literal with `'` doubled; `N'...'` when `unicode` is set.
pub fn string_literal(value: &str, unicode: bool) -> String {
    let escaped = value.replace('\'', "''");
    if unicode {
        format!("N'{}'", escaped)
    } else {
        format!("'{}'", escaped)
    }
}

/// Object type codes accepted by `OBJECT_ID(name, type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    ForeignKey,
    Default,
}

impl ObjectKind {
    fn code(self) -> &'static str {
        match self {
            Self::Table => "U",
            Self::ForeignKey => "F",
            Self::Default => "D",
        }
    }
}

/// `OBJECT_ID(N'[dbo].[name]', N'U')`.
pub fn object_id(schema: &str, name: &str, kind: ObjectKind) -> String {
    format!(
        "OBJECT_ID({}, {})",
        string_literal(&qualified(schema, name), true),
        string_literal(kind.code(), true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words_sorted() {
        assert!(RESERVED_WORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_is_reserved() {
        assert!(is_reserved("Order"));
        assert!(is_reserved("user"));
        assert!(!is_reserved("Customer"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("Order"), "[Order]");
        assert_eq!(quote_ident("odd]name"), "[odd]]name]");
        assert_eq!(qualified("dbo", "Order"), "[dbo].[Order]");
        assert_eq!(string_literal("O'Brien", true), "N'O''Brien'");
        assert_eq!(string_literal("x", false), "'x'");
    }

    #[test]
    fn test_object_id() {
        assert_eq!(
            object_id("dbo", "FK_A_B", ObjectKind::ForeignKey),
            "OBJECT_ID(N'[dbo].[FK_A_B]', N'F')"
        );
    }
}
