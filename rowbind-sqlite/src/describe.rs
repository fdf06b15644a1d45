use crate::SqliteConnection;
use rowbind_core::{
    AsValue, ColumnSpec, ColumnType, Context, DefaultValue, Driver, Error, Executor, Result,
    SqlWriter, TableSchema, Value, consume_while, parse_string_list, stream::TryStreamExt,
};

/// Read the columns of `table` from `sqlite_master` and `PRAGMA table_info`.
pub(crate) async fn describe_table(
    connection: &mut SqliteConnection,
    table: &str,
) -> Result<TableSchema> {
    let writer = connection.driver().sql_writer();
    let mut sql =
        String::from("SELECT name, sql FROM sqlite_master WHERE type = 'table' AND name = ");
    writer.write_value_string(&mut sql, table);
    sql.push_str(" COLLATE NOCASE;");
    let row = connection
        .fetch(sql)
        .try_collect::<Vec<_>>()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::msg(format!("Table `{}` does not exist", table)))?;
    // Table names are case insensitive, the catalog has the declared spelling
    let table = row
        .get_column("name")
        .and_then(Value::as_str)
        .unwrap_or(table)
        .to_string();
    let definition = row
        .get_column("sql")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let checks = enum_checks(&definition);

    let mut sql = String::from("PRAGMA table_info(");
    writer.write_identifier_quoted(&mut sql, &table);
    sql.push_str(");");
    let rows = connection.fetch(sql).try_collect::<Vec<_>>().await?;
    let mut columns = Vec::with_capacity(rows.len());
    let mut integer_keys = 0;
    let mut keys = 0;
    for row in rows {
        let name = String::try_from_value(row.get_column("name").cloned().unwrap_or_default())
            .context("PRAGMA table_info returned a column without name")?;
        let declared = row
            .get_column("type")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut column_type = ColumnType::from_sql_type(declared);
        if matches!(column_type, ColumnType::Text | ColumnType::Varchar(..)) || declared.is_empty()
        {
            if let Some((_, choices)) = checks.iter().find(|(c, _)| c.eq_ignore_ascii_case(&name)) {
                column_type = ColumnType::Enum(choices.clone());
            }
        }
        let primary_key = row.get_column("pk").and_then(Value::as_i64).unwrap_or(0) > 0;
        let not_null = row.get_column("notnull").and_then(Value::as_i64).unwrap_or(0) != 0;
        let default = row
            .get_column("dflt_value")
            .and_then(Value::as_str)
            .map(|v| DefaultValue::from_sql(v, &column_type));
        if primary_key {
            keys += 1;
            if declared.eq_ignore_ascii_case("INTEGER") {
                integer_keys += 1;
            }
        }
        columns.push(ColumnSpec {
            name,
            column_type,
            nullable: !not_null && !primary_key,
            primary_key,
            default,
            auto_increment: false,
        });
    }
    if keys == 1 && integer_keys == 1 {
        // INTEGER PRIMARY KEY aliases the rowid
        if let Some(column) = columns.iter_mut().find(|c| c.primary_key) {
            column.auto_increment = true;
        }
    }
    TableSchema::new(table, columns)
}

/// Columns restricted by `CHECK (<column> IN ('a', 'b', ...))` constraints.
fn enum_checks(definition: &str) -> Vec<(String, Vec<String>)> {
    let mut result = Vec::new();
    let upper = definition.to_ascii_uppercase();
    let mut position = 0;
    while let Some(found) = upper[position..].find("CHECK") {
        position += found + "CHECK".len();
        let Some(rest) = definition[position..].trim_start().strip_prefix('(') else {
            continue;
        };
        let mut input = rest.trim_start();
        let Some(column) = parse_identifier(&mut input) else {
            continue;
        };
        input = input.trim_start();
        if !input.get(..2).is_some_and(|v| v.eq_ignore_ascii_case("IN")) {
            continue;
        }
        if let Some(choices) = parse_string_list(&input[2..]) {
            result.push((column, choices));
        }
    }
    result
}

/// Identifier at the start of `input`, bare or quoted with `"`, `` ` `` or `[]`.
fn parse_identifier(input: &mut &str) -> Option<String> {
    let close = match input.chars().next()? {
        '"' => '"',
        '`' => '`',
        '[' => ']',
        _ => {
            let name = consume_while(input, |c| c.is_alphanumeric() || *c == '_');
            return (!name.is_empty()).then(|| name.to_string());
        }
    };
    let mut rest = &input[1..];
    let mut name = String::new();
    loop {
        name.push_str(consume_while(&mut rest, |c| *c != close));
        rest = rest.strip_prefix(close)?;
        match rest.strip_prefix(close) {
            Some(escaped) if close != ']' => {
                name.push(close);
                rest = escaped;
            }
            _ => {
                *input = rest;
                return Some(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{enum_checks, parse_identifier};
    use indoc::indoc;

    #[test]
    fn identifiers() {
        let mut input = "\"some \"\"quoted\"\" name\" IN";
        assert_eq!(
            parse_identifier(&mut input).as_deref(),
            Some("some \"quoted\" name")
        );
        assert_eq!(input, " IN");
        let mut input = "[lang] IN";
        assert_eq!(parse_identifier(&mut input).as_deref(), Some("lang"));
        let mut input = "lang_2 IN";
        assert_eq!(parse_identifier(&mut input).as_deref(), Some("lang_2"));
        let mut input = "('a')";
        assert_eq!(parse_identifier(&mut input), None);
    }

    #[test]
    fn check_constraints() {
        let definition = indoc! {r#"
            CREATE TABLE "greeting" (
                "id" INTEGER PRIMARY KEY,
                "data" TEXT NOT NULL,
                "lang" TEXT DEFAULT 'en' check ("lang" in ('en', 'ja', 'it''s')),
                "size" INTEGER CHECK (size > 0),
                status VARCHAR(8) CHECK(status IN('open','closed'))
            )
        "#};
        assert_eq!(
            enum_checks(definition),
            vec![
                (
                    "lang".to_string(),
                    vec!["en".to_string(), "ja".to_string(), "it's".to_string()]
                ),
                (
                    "status".to_string(),
                    vec!["open".to_string(), "closed".to_string()]
                ),
            ]
        );
    }
}
