// Copyright 2026 Corpus Probe Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::Result;
use anyhow::bail;
use rusqlite::types::Value as SqlValue;

use crate::model::TableRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlColumn {
    DocumentId,
    Title,
    FullText,
    FileType,
    Category,
    RelevanceScore,
}

impl SqlColumn {
    pub fn sql(self) -> &'static str {
        match self {
            SqlColumn::DocumentId => "document_id",
            SqlColumn::Title => "title",
            SqlColumn::FullText => "full_text",
            SqlColumn::FileType => "file_type",
            SqlColumn::Category => "category",
            SqlColumn::RelevanceScore => "relevance_score",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: SqlType,
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table_sql(table: &TableRef, columns: &[ColumnDef]) -> Result<String> {
    if columns.is_empty() {
        bail!("cannot create {table} without columns");
    }
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), c.ty.as_str()))
        .collect();
    Ok(format!(
        "CREATE TABLE {} ({})",
        table.quoted(),
        defs.join(", ")
    ))
}

pub fn insert_sql(table: &TableRef, columns: &[ColumnDef]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.quoted(),
        names.join(", "),
        placeholders.join(", ")
    )
}

#[derive(Clone, Debug)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn column(column: SqlColumn) -> Self {
        Self::raw(column.sql())
    }

    pub fn value(value: SqlValue) -> Self {
        Self {
            sql: "?".to_string(),
            params: vec![value],
        }
    }

    pub fn cmp(self, op: &str, value: SqlValue) -> Self {
        let sql = format!("{} {} ?", self.sql, op);
        let mut params = self.params;
        params.push(value);
        Self { sql, params }
    }

    pub fn call(name: &str, args: Vec<SqlFragment>) -> Self {
        let mut params = Vec::new();
        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            rendered.push(arg.sql);
            params.extend(arg.params);
        }
        Self {
            sql: format!("{}({})", name, rendered.join(", ")),
            params,
        }
    }

    /// `CASE WHEN cond THEN then ELSE otherwise END`
    pub fn case_when(cond: SqlFragment, then: SqlFragment, otherwise: SqlFragment) -> Self {
        let sql = format!(
            "CASE WHEN {} THEN {} ELSE {} END",
            cond.sql, then.sql, otherwise.sql
        );
        let mut params = cond.params;
        params.extend(then.params);
        params.extend(otherwise.params);
        Self { sql, params }
    }

    pub fn add(self, other: SqlFragment) -> SqlFragment {
        self.binary("+", other)
    }

    pub fn mul(self, other: SqlFragment) -> SqlFragment {
        self.binary("*", other)
    }

    fn binary(self, op: &str, other: SqlFragment) -> SqlFragment {
        let sql = format!("({}) {} ({})", self.sql, op, other.sql);
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment { sql, params }
    }
}

#[derive(Clone, Debug)]
pub struct SqlSelectItem {
    expr: SqlFragment,
    alias: Option<&'static str>,
}

impl SqlSelectItem {
    pub fn new(expr: SqlFragment) -> Self {
        Self { expr, alias: None }
    }

    pub fn column(column: SqlColumn) -> Self {
        Self::new(SqlFragment::column(column))
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    fn to_sql(&self) -> String {
        if let Some(alias) = self.alias {
            format!("{} AS {}", self.expr.sql, alias)
        } else {
            self.expr.sql.clone()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlOrderDir {
    Asc,
    Desc,
}

impl SqlOrderDir {
    fn as_str(self) -> &'static str {
        match self {
            SqlOrderDir::Asc => "ASC",
            SqlOrderDir::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlOrderBy {
    expr: String,
    dir: SqlOrderDir,
}

impl SqlOrderBy {
    pub fn asc(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            dir: SqlOrderDir::Asc,
        }
    }

    pub fn desc(expr: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            dir: SqlOrderDir::Desc,
        }
    }

    fn to_sql(&self) -> String {
        format!("{} {}", self.expr, self.dir.as_str())
    }
}

#[derive(Clone, Debug)]
enum SqlSource {
    Table(TableRef),
    Subquery(String, Vec<SqlValue>),
}

#[derive(Clone, Debug)]
pub struct SqlSelectBuilder {
    select: Vec<SqlSelectItem>,
    from: SqlSource,
    where_clause: Option<SqlFragment>,
    order_by: Vec<SqlOrderBy>,
    limit: Option<usize>,
}

impl SqlSelectBuilder {
    pub fn new(from: TableRef) -> Self {
        Self::with_source(SqlSource::Table(from))
    }

    pub fn from_subquery(inner: SqlSelectBuilder) -> Self {
        let (sql, params) = inner.build();
        Self::with_source(SqlSource::Subquery(sql, params))
    }

    fn with_source(from: SqlSource) -> Self {
        Self {
            select: Vec::new(),
            from,
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn select<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = SqlSelectItem>,
    {
        self.select.extend(items);
        self
    }

    pub fn where_clause(mut self, clause: SqlFragment) -> Self {
        self.where_clause = Some(clause);
        self
    }

    pub fn order_by(mut self, order: SqlOrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn build(self) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            let mut first = true;
            for item in &self.select {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                sql.push_str(&item.to_sql());
            }
            for item in self.select {
                params.extend(item.expr.params);
            }
        }
        sql.push_str(" FROM ");
        match self.from {
            SqlSource::Table(table) => sql.push_str(&table.quoted()),
            SqlSource::Subquery(inner, inner_params) => {
                sql.push('(');
                sql.push_str(&inner);
                sql.push(')');
                params.extend(inner_params);
            }
        }

        if let Some(where_clause) = self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.sql);
            params.extend(where_clause.params);
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let mut first = true;
            for order in &self.order_by {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                sql.push_str(&order.to_sql());
            }
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::from(limit as i64));
        }

        (sql, params)
    }
}
