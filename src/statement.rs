//! Dialect-neutral statements handed to a [`Connection`](crate::connection::Connection).
//!
//! [`Statement::to_sql`] is a reference rendering used for logging and tests.
//! Drivers are free to render their own dialect from the structured form.

use crate::core::{RequestError, Result};
use crate::query::{Direction, Filter, OrderBy, Pagination};
use crate::schema::{ColumnDefinition, TableSchema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaceholderStyle {
    /// `?1`, `?2`, ...
    #[default]
    Numbered,
    /// `$1`, `$2`, ...
    Dollar,
}

impl PlaceholderStyle {
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            PlaceholderStyle::Numbered => format!("?{}", index),
            PlaceholderStyle::Dollar => format!("${}", index),
        }
    }
}

impl FromStr for PlaceholderStyle {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numbered" | "?" => Ok(Self::Numbered),
            "dollar" | "$" => Ok(Self::Dollar),
            other => Err(RequestError::internal(format!(
                "Unknown placeholder style '{}'",
                other
            ))),
        }
    }
}

/// Double-quotes an identifier, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Statement {
    CreateTable(TableSchema),
    DropTable {
        table: String,
    },
    /// Parameters bind `columns` in order.
    Insert {
        table: String,
        columns: Vec<String>,
        returning: Option<String>,
    },
    /// Parameters bind `columns` in order, then the filter's placeholders.
    Update {
        table: String,
        columns: Vec<String>,
        filter: Filter,
    },
    Delete {
        table: String,
        filter: Option<Filter>,
    },
    Select {
        table: String,
        filter: Option<Filter>,
        order: Vec<OrderBy>,
        page: Option<Pagination>,
    },
}

impl Statement {
    pub fn table(&self) -> &str {
        match self {
            Statement::CreateTable(schema) => &schema.table_name,
            Statement::DropTable { table }
            | Statement::Insert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. }
            | Statement::Select { table, .. } => table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::CreateTable(_) => "create_table",
            Statement::DropTable { .. } => "drop_table",
            Statement::Insert { .. } => "insert",
            Statement::Update { .. } => "update",
            Statement::Delete { .. } => "delete",
            Statement::Select { .. } => "select",
        }
    }

    pub fn to_sql(&self, style: PlaceholderStyle) -> String {
        match self {
            Statement::CreateTable(schema) => create_table_sql(schema),
            Statement::DropTable { table } => format!("DROP TABLE {}", quote_identifier(table)),
            Statement::Insert {
                table,
                columns,
                returning,
            } => {
                let mut sql = if columns.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
                } else {
                    let names = columns.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>();
                    let values = (1..=columns.len()).map(|i| style.placeholder(i)).collect::<Vec<_>>();
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        quote_identifier(table),
                        names.join(", "),
                        values.join(", ")
                    )
                };
                if let Some(column) = returning {
                    sql.push_str(&format!(" RETURNING {}", quote_identifier(column)));
                }
                sql
            }
            Statement::Update {
                table,
                columns,
                filter,
            } => {
                let assignments = columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| format!("{} = {}", quote_identifier(c), style.placeholder(i + 1)))
                    .collect::<Vec<_>>();
                format!(
                    "UPDATE {} SET {} WHERE {}",
                    quote_identifier(table),
                    assignments.join(", "),
                    filter.render(table, style)
                )
            }
            Statement::Delete { table, filter } => {
                let mut sql = format!("DELETE FROM {}", quote_identifier(table));
                if let Some(filter) = filter {
                    sql.push_str(&format!(" WHERE {}", filter.render(table, style)));
                }
                sql
            }
            Statement::Select {
                table,
                filter,
                order,
                page,
            } => {
                let mut sql = format!("SELECT * FROM {}", quote_identifier(table));
                if let Some(filter) = filter {
                    sql.push_str(&format!(" WHERE {}", filter.render(table, style)));
                }
                if !order.is_empty() {
                    let terms = order
                        .iter()
                        .map(|o| {
                            let direction = match o.direction {
                                Direction::Ascending => "ASC",
                                Direction::Descending => "DESC",
                            };
                            format!("{}.{} {}", quote_identifier(table), quote_identifier(&o.column), direction)
                        })
                        .collect::<Vec<_>>();
                    sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
                }
                if let Some(page) = page {
                    sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit, page.offset));
                }
                sql
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(PlaceholderStyle::default()))
    }
}

fn column_sql(column: &ColumnDefinition) -> String {
    let mut sql = format!("{} {}", quote_identifier(&column.name), column.sql_type);
    if column.auto_increment {
        sql.push_str(" AUTO_INCREMENT");
    }
    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
    } else if column.not_null {
        sql.push_str(" NOT NULL");
    }
    sql
}

fn create_table_sql(schema: &TableSchema) -> String {
    let mut parts = schema.columns.iter().map(column_sql).collect::<Vec<_>>();
    for fk in &schema.foreign_keys {
        parts.push(format!(
            "FOREIGN KEY ({}) REFERENCES {}({})",
            quote_identifier(&fk.local_column),
            quote_identifier(&fk.target_table),
            quote_identifier(&fk.target_column)
        ));
    }
    format!("CREATE TABLE {} ({})", quote_identifier(&schema.table_name), parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlType;
    use crate::query::Comparison;

    fn users() -> TableSchema {
        TableSchema::new(
            "Users",
            vec![
                ColumnDefinition::new("modelID", SqlType::BigInt).identity(),
                ColumnDefinition::new("username", SqlType::Text).not_null(),
                ColumnDefinition::new("nickname", SqlType::Text),
                ColumnDefinition::new("team", SqlType::BigInt)
                    .not_null()
                    .references("Teams", "id"),
            ],
        )
    }

    #[test]
    fn renders_create_table() {
        assert_eq!(
            Statement::CreateTable(users()).to_sql(PlaceholderStyle::Numbered),
            r#"CREATE TABLE "Users" ("modelID" BIGINT AUTO_INCREMENT PRIMARY KEY, "username" TEXT NOT NULL, "nickname" TEXT, "team" BIGINT NOT NULL, FOREIGN KEY ("team") REFERENCES "Teams"("id"))"#
        );
    }

    #[test]
    fn renders_drop_and_insert() {
        assert_eq!(
            Statement::DropTable { table: "Users".into() }.to_string(),
            r#"DROP TABLE "Users""#
        );
        let insert = Statement::Insert {
            table: "Persons".into(),
            columns: vec!["name".into(), "age".into()],
            returning: Some("id".into()),
        };
        assert_eq!(
            insert.to_sql(PlaceholderStyle::Dollar),
            r#"INSERT INTO "Persons" ("name", "age") VALUES ($1, $2) RETURNING "id""#
        );
    }

    #[test]
    fn insert_without_columns_uses_default_values() {
        let insert = Statement::Insert {
            table: "Notes".into(),
            columns: Vec::new(),
            returning: Some("id".into()),
        };
        assert_eq!(
            insert.to_sql(PlaceholderStyle::Numbered),
            r#"INSERT INTO "Notes" DEFAULT VALUES RETURNING "id""#
        );

        let bare = Statement::Insert {
            table: "Notes".into(),
            columns: Vec::new(),
            returning: None,
        };
        assert_eq!(bare.to_sql(PlaceholderStyle::Dollar), r#"INSERT INTO "Notes" DEFAULT VALUES"#);
    }

    #[test]
    fn renders_update_and_select() {
        let update = Statement::Update {
            table: "Persons".into(),
            columns: vec!["name".into(), "age".into()],
            filter: Filter::predicate("id", Comparison::Equal, 3),
        };
        assert_eq!(
            update.to_sql(PlaceholderStyle::Numbered),
            r#"UPDATE "Persons" SET "name" = ?1, "age" = ?2 WHERE "Persons"."id" = ?3"#
        );

        let select = Statement::Select {
            table: "Persons".into(),
            filter: Some(Filter::predicate("modelID", Comparison::Equal, 1)),
            order: vec![OrderBy {
                column: "age".into(),
                direction: Direction::Descending,
            }],
            page: Some(Pagination { limit: 10, offset: 20 }),
        };
        assert_eq!(
            select.to_sql(PlaceholderStyle::Numbered),
            r#"SELECT * FROM "Persons" WHERE "Persons"."modelID" = ?1 ORDER BY "Persons"."age" DESC LIMIT 10 OFFSET 20"#
        );
    }

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn parses_placeholder_styles() {
        assert_eq!("dollar".parse::<PlaceholderStyle>().unwrap(), PlaceholderStyle::Dollar);
        assert_eq!("?".parse::<PlaceholderStyle>().unwrap(), PlaceholderStyle::Numbered);
        assert!("colon".parse::<PlaceholderStyle>().is_err());
    }
}
