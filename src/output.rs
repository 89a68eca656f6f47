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
use serde::Serialize;

use crate::model::ResultRow;
use crate::store::TableStats;

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatsOut {
    pub took_ms: i64,
    pub total_hits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<i64>,
}

/// Record summary; `full_text` is left out of JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOut {
    pub document_id: i64,
    pub title: String,
    pub file_path: String,
    pub file_type: String,
    pub length: i64,
    pub category: String,
    pub relevance_score: f64,
}

impl From<&crate::model::DocumentRecord> for RecordOut {
    fn from(record: &crate::model::DocumentRecord) -> Self {
        Self {
            document_id: record.document_id,
            title: record.title.clone(),
            file_path: record.file_path.clone(),
            file_type: record.file_type.clone(),
            length: record.length,
            category: record.category.label().to_string(),
            relevance_score: record.relevance_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOut {
    pub query: String,
    pub k: usize,
    /// `None` when the query failed.
    pub results: Option<Vec<ResultRow>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<RecordOut>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub searches: Vec<SearchOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_stats: Option<TableStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            schema_version: "1".to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            schema_version: "1".to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
                hint: None,
            }),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        if let Some(error) = &mut self.error {
            error.hint = Some(hint.to_string());
        }
        self
    }

    pub fn with_table(mut self, table: Option<String>) -> Self {
        self.table = table;
        self
    }

    pub fn with_records(mut self, records: Vec<RecordOut>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn with_search(mut self, search: SearchOut) -> Self {
        self.searches.push(search);
        self
    }

    pub fn with_table_stats(mut self, stats: Option<TableStats>) -> Self {
        self.table_stats = stats;
        self
    }

    pub fn with_stats(mut self, stats: StatsOut) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}
