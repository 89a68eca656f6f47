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

//! Heuristic scored search over a loaded table.

use std::cmp::Ordering;
use std::fmt::Write as _;

use rusqlite::types::Value as SqlValue;
use tracing::error;
use tracing::info;

use crate::config::ScoringConfig;
use crate::model::DocumentRecord;
use crate::model::ResultRow;
use crate::model::TableRef;
use crate::sql::SqlColumn;
use crate::sql::SqlFragment;
use crate::sql::SqlOrderBy;
use crate::sql::SqlSelectBuilder;
use crate::sql::SqlSelectItem;
use crate::store::Warehouse;

/// Name of the case-insensitive substring predicate available to SQL backends.
pub const CONTAINS_SUBSTR: &str = "contains_substr";

/// A scored search against one table.
///
/// Per row, `score = text_hit * text_weight + title_hit * title_weight +
/// relevance_score * relevance_weight`, where the hits are case-insensitive
/// substring matches of `needle`. Rows scoring `<= 0` are dropped; the rest
/// are ordered by score, then relevance, then id, and capped at `limit`.
#[derive(Debug, Clone)]
pub struct ScoreQuery {
    pub table: TableRef,
    pub needle: String,
    pub text_weight: f64,
    pub title_weight: f64,
    pub relevance_weight: f64,
    pub limit: usize,
}

/// Unrounded row as produced by a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub document_id: i64,
    pub title: String,
    pub category: String,
    pub file_type: String,
    pub score: f64,
    pub relevance_score: f64,
}

impl ScoreQuery {
    pub fn new(table: TableRef, needle: &str, limit: usize, scoring: &ScoringConfig) -> Self {
        Self {
            table,
            needle: needle.to_string(),
            text_weight: scoring.text_match_weight,
            title_weight: scoring.title_match_weight,
            relevance_weight: scoring.relevance_weight,
            limit,
        }
    }

    pub fn score(&self, record: &DocumentRecord) -> f64 {
        let text_hit = if contains_substr(&record.full_text, &self.needle) {
            self.text_weight
        } else {
            0.0
        };
        let title_hit = if contains_substr(&record.title, &self.needle) {
            self.title_weight
        } else {
            0.0
        };
        // Same association as the SQL expression so both backends agree bit-for-bit.
        (text_hit + title_hit) + record.relevance_score * self.relevance_weight
    }

    /// Evaluates the query over in-memory records.
    pub fn evaluate(&self, records: &[DocumentRecord]) -> Vec<ScoredRow> {
        let mut rows: Vec<ScoredRow> = records
            .iter()
            .map(|record| ScoredRow {
                document_id: record.document_id,
                title: record.title.clone(),
                category: record.category.label().to_string(),
                file_type: record.file_type.clone(),
                score: self.score(record),
                relevance_score: record.relevance_score,
            })
            .filter(|row| row.score > 0.0)
            .collect();
        rows.sort_by(rank_cmp);
        rows.truncate(self.limit);
        rows
    }

    /// Compiles the query to one SQL statement using [`CONTAINS_SUBSTR`].
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        let hit = |column: SqlColumn, weight: f64| {
            SqlFragment::case_when(
                SqlFragment::call(
                    CONTAINS_SUBSTR,
                    vec![
                        SqlFragment::column(column),
                        SqlFragment::value(SqlValue::Text(self.needle.clone())),
                    ],
                ),
                SqlFragment::value(SqlValue::Real(weight)),
                SqlFragment::raw("0.0"),
            )
        };
        let score = hit(SqlColumn::FullText, self.text_weight)
            .add(hit(SqlColumn::Title, self.title_weight))
            .add(
                SqlFragment::column(SqlColumn::RelevanceScore)
                    .mul(SqlFragment::value(SqlValue::Real(self.relevance_weight))),
            );

        let inner = SqlSelectBuilder::new(self.table.clone()).select([
            SqlSelectItem::column(SqlColumn::DocumentId),
            SqlSelectItem::column(SqlColumn::Title),
            SqlSelectItem::column(SqlColumn::Category),
            SqlSelectItem::column(SqlColumn::FileType),
            SqlSelectItem::column(SqlColumn::RelevanceScore),
            SqlSelectItem::new(score).alias("raw_score"),
        ]);
        SqlSelectBuilder::from_subquery(inner)
            .select([
                SqlSelectItem::column(SqlColumn::DocumentId),
                SqlSelectItem::column(SqlColumn::Title),
                SqlSelectItem::column(SqlColumn::Category),
                SqlSelectItem::column(SqlColumn::FileType),
                SqlSelectItem::new(SqlFragment::raw("raw_score")),
                SqlSelectItem::column(SqlColumn::RelevanceScore),
            ])
            .where_clause(SqlFragment::raw("raw_score").cmp(">", SqlValue::Real(0.0)))
            .order_by(SqlOrderBy::desc("raw_score"))
            .order_by(SqlOrderBy::desc(SqlColumn::RelevanceScore.sql()))
            .order_by(SqlOrderBy::asc(SqlColumn::DocumentId.sql()))
            .limit(self.limit)
            .build()
    }
}

pub fn contains_substr(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn rank_cmp(a: &ScoredRow, b: &ScoredRow) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.document_id.cmp(&b.document_id))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Runs one scored query. Failures are logged and reported as `None`.
pub fn search_documents(
    store: &dyn Warehouse,
    table: &TableRef,
    query_text: &str,
    k: usize,
    scoring: &ScoringConfig,
) -> Option<Vec<ResultRow>> {
    let query = ScoreQuery::new(table.clone(), query_text, k, scoring);
    match store.query(&query) {
        Ok(rows) => {
            info!(query = query_text, hits = rows.len(), "search complete");
            Some(
                rows.into_iter()
                    .map(|row| ResultRow {
                        document_id: row.document_id,
                        title: row.title,
                        category: row.category,
                        file_type: row.file_type,
                        similarity_score: round2(row.score),
                        relevance_score: row.relevance_score,
                    })
                    .collect(),
            )
        }
        Err(err) => {
            let message = format!("{err:#}");
            error!(query = query_text, error = %message, "search failed");
            None
        }
    }
}

pub fn render_results(rows: &[ResultRow]) -> String {
    let cells: Vec<[String; 3]> = rows
        .iter()
        .map(|row| {
            [
                row.title.clone(),
                row.category.clone(),
                format!("{:.2}", row.similarity_score),
            ]
        })
        .collect();
    render_columns(&["title", "category", "similarity_score"], &cells)
}

pub fn render_records(records: &[DocumentRecord]) -> String {
    let cells: Vec<[String; 4]> = records
        .iter()
        .map(|record| {
            [
                record.title.clone(),
                record.category.label().to_string(),
                record.file_type.clone(),
                record.length.to_string(),
            ]
        })
        .collect();
    render_columns(&["title", "category", "file_type", "length"], &cells)
}

fn render_columns<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) -> String {
    let mut widths = (*headers).map(|h| h.chars().count());
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let mut out = String::new();
    let header_cells = (*headers).map(str::to_string);
    for row in std::iter::once(&header_cells).chain(rows) {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate() {
            if idx > 0 {
                line.push_str("  ");
            }
            let _ = write!(line, "{:<width$}", cell, width = widths[idx]);
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
