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

//! Shared domain types used across scanning, loading, and querying.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// One scanned local file plus its derived metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub document_id: i64,
    pub title: String,
    pub full_text: String,
    pub file_path: String,
    pub file_type: String,
    pub length: i64,
    pub category: Category,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Python Code")]
    PythonCode,
    #[serde(rename = "SQL Scripts")]
    SqlScripts,
    #[serde(rename = "Documentation")]
    Documentation,
    #[serde(rename = "Configuration")]
    Configuration,
    #[serde(rename = "Jupyter Notebook")]
    JupyterNotebook,
    #[serde(rename = "General Files")]
    GeneralFiles,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::PythonCode => "Python Code",
            Category::SqlScripts => "SQL Scripts",
            Category::Documentation => "Documentation",
            Category::Configuration => "Configuration",
            Category::JupyterNotebook => "Jupyter Notebook",
            Category::GeneralFiles => "General Files",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Three-part table identifier, `project.dataset.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Quoted SQL identifier; embedded double quotes are doubled.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.to_string().replace('"', "\"\""))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// One ranked row returned by a scored query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub document_id: i64,
    pub title: String,
    pub category: String,
    pub file_type: String,
    pub similarity_score: f64,
    pub relevance_score: f64,
}
