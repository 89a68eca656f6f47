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

use tracing::error;
use tracing::info;

use crate::model::DocumentRecord;
use crate::model::TableRef;
use crate::store::Warehouse;

/// Replaces `table` with `records`.
///
/// Returns the table on success and `None` when there is nothing to load or
/// the store rejects the write; callers skip querying in that case.
pub fn upload_documents(
    store: &mut dyn Warehouse,
    table: &TableRef,
    records: &[DocumentRecord],
) -> Option<TableRef> {
    if records.is_empty() {
        error!(%table, "no documents to upload");
        return None;
    }
    match store.bulk_replace(table, records) {
        Ok(count) => {
            info!(%table, rows = count, "uploaded documents");
            Some(table.clone())
        }
        Err(err) => {
            let message = format!("{err:#}");
            error!(%table, error = %message, "upload failed");
            None
        }
    }
}
