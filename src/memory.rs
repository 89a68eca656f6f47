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

//! In-process [`Warehouse`] used for dry runs and tests.
//!
//! Tables live in a map keyed by their three-part name and vanish with the
//! process. Queries are evaluated by [`ScoreQuery::evaluate`].

use std::collections::BTreeMap;
use std::collections::HashMap;

use anyhow::Result;

use crate::model::DocumentRecord;
use crate::model::TableRef;
use crate::query::ScoreQuery;
use crate::query::ScoredRow;
use crate::store::TableStats;
use crate::store::Warehouse;
use crate::store::now_rfc3339;

struct StoredTable {
    records: Vec<DocumentRecord>,
    loaded_at: String,
}

#[derive(Default)]
pub struct MemoryWarehouse {
    tables: HashMap<String, StoredTable>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Warehouse for MemoryWarehouse {
    fn bulk_replace(&mut self, table: &TableRef, records: &[DocumentRecord]) -> Result<usize> {
        if records.is_empty() {
            anyhow::bail!("cannot infer a schema from zero rows");
        }
        self.tables.insert(
            table.to_string(),
            StoredTable {
                records: records.to_vec(),
                loaded_at: now_rfc3339(),
            },
        );
        Ok(records.len())
    }

    fn query(&self, query: &ScoreQuery) -> Result<Vec<ScoredRow>> {
        let Some(stored) = self.tables.get(&query.table.to_string()) else {
            anyhow::bail!("no such table: {}", query.table);
        };
        Ok(query.evaluate(&stored.records))
    }

    fn table_stats(&self, table: &TableRef) -> Result<Option<TableStats>> {
        let Some(stored) = self.tables.get(&table.to_string()) else {
            return Ok(None);
        };
        let mut categories = BTreeMap::new();
        for record in &stored.records {
            *categories
                .entry(record.category.label().to_string())
                .or_insert(0) += 1;
        }
        Ok(Some(TableStats {
            table: table.to_string(),
            row_count: stored.records.len() as i64,
            categories,
            loaded_at: Some(stored.loaded_at.clone()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::config::ScoringConfig;
    use crate::model::Category;
    use crate::store::SqliteWarehouse;
    use crate::store::StoreMode;

    fn fixture() -> Vec<DocumentRecord> {
        let rows = [
            ("pipeline.py", "import pandas\nclient = bigquery.Client()", 4.2, Category::PythonCode),
            ("README.md", "# Smart Document discovery with BigQuery", 1.3, Category::Documentation),
            ("schema.sql", "SELECT * FROM docs WHERE data IS NOT NULL", 0.7, Category::SqlScripts),
            ("data.json", "{\"competition\": \"kaggle\"}", 0.2, Category::Configuration),
            ("bigquery_notes.txt", "notes about the warehouse", 2.6, Category::Documentation),
        ];
        rows.into_iter()
            .enumerate()
            .map(|(idx, (title, text, relevance, category))| DocumentRecord {
                document_id: idx as i64 + 1,
                title: title.to_string(),
                full_text: text.to_string(),
                file_path: format!("./{title}"),
                file_type: format!(".{}", title.rsplit('.').next().unwrap_or("")),
                length: (relevance * 1000.0) as i64,
                category,
                relevance_score: relevance,
            })
            .collect()
    }

    #[test]
    fn query_before_load_errors() {
        let store = MemoryWarehouse::new();
        let query = ScoreQuery::new(
            TableRef::new("p", "d", "t"),
            "x",
            3,
            &ScoringConfig::default(),
        );
        assert!(store.query(&query).is_err());
    }

    #[test]
    fn empty_load_is_rejected() {
        let mut store = MemoryWarehouse::new();
        assert!(store.bulk_replace(&TableRef::new("p", "d", "t"), &[]).is_err());
    }

    #[test]
    fn memory_and_sqlite_rank_identically() -> Result<()> {
        let dir = tempdir()?;
        let table = TableRef::new("proj", "ds", "docs");
        let records = fixture();

        let mut memory = MemoryWarehouse::new();
        memory.bulk_replace(&table, &records)?;
        let mut sqlite = SqliteWarehouse::open(&dir.path().join("probe.db"), StoreMode::ReadWrite)?;
        sqlite.bulk_replace(&table, &records)?;

        let scoring = ScoringConfig::default();
        for needle in ["bigquery", "competition", "python", "data", "smart document", "zzz"] {
            for k in [1, 3, 10] {
                let query = ScoreQuery::new(table.clone(), needle, k, &scoring);
                let from_memory = memory.query(&query)?;
                let from_sqlite = sqlite.query(&query)?;
                let ids = |rows: &[ScoredRow]| rows.iter().map(|r| r.document_id).collect::<Vec<_>>();
                assert_eq!(ids(&from_memory), ids(&from_sqlite), "needle {needle} k {k}");
                for (a, b) in from_memory.iter().zip(&from_sqlite) {
                    assert!((a.score - b.score).abs() < 1e-9);
                    assert_eq!(a.category, b.category);
                }
            }
        }

        let mem_stats = memory.table_stats(&table)?.expect("memory stats");
        let sql_stats = sqlite.table_stats(&table)?.expect("sqlite stats");
        assert_eq!(mem_stats.row_count, sql_stats.row_count);
        assert_eq!(mem_stats.categories, sql_stats.categories);
        Ok(())
    }
}
