//! Commits `AnalysisRecord`s to the document store, chunking long content
//! into paragraph blocks and retrying through the shared `RetryPolicy`
//! (spec §4.8 "Page creator").

use super::chunk::chunk_content;
use super::client::DocumentStoreClient;
use crate::core::error::StoreError;
use crate::core::types::{AnalysisRecord, Category};
use crate::retry::RetryPolicy;
use serde_json::{json, Value};
use tracing::info;

pub struct StoreConfig {
    pub tasks_database_id: String,
    pub notes_database_id: String,
    pub chunk_chars: usize,
}

pub struct StoreWriter<C: DocumentStoreClient> {
    client: C,
    policy: RetryPolicy,
    config: StoreConfig,
}

impl<C: DocumentStoreClient> StoreWriter<C> {
    pub fn new(client: C, policy: RetryPolicy, config: StoreConfig) -> Self {
        Self { client, policy, config }
    }

    /// Create the page for one record and stamp its store id back onto the
    /// record on success (spec §4.8, §4.9 "verify before archive").
    pub async fn commit(&self, record: &mut AnalysisRecord) -> Result<String, StoreError> {
        let database_id = match record.category() {
            Category::Task => &self.config.tasks_database_id,
            Category::Note => &self.config.notes_database_id,
        };
        let properties = build_properties(record);
        let children = build_children(&record.common().content, self.config.chunk_chars);

        let page_id = self
            .policy
            .run("store.create_page", |_attempt| self.client.create_page(database_id, properties.clone(), children.clone()))
            .await?;

        info!(page_id, category = %record.category(), "page committed to store");
        record.set_store_entry_id(page_id.clone());
        Ok(page_id)
    }
}

fn build_properties(record: &AnalysisRecord) -> Value {
    let common = record.common();
    let mut properties = json!({
        "Name": { "title": [{ "text": { "content": common.title } }] },
        "Icon": { "select": { "name": common.icon } },
        "Tags": { "multi_select": common.tags.iter().map(|t| json!({ "name": t })).collect::<Vec<_>>() },
        "Confidence": { "number": common.confidence },
        "Manual Review": { "checkbox": common.manual_review_flag },
    });

    if let Some(project) = &common.project_name {
        properties["Project"] = json!({ "rich_text": [{ "text": { "content": project } }] });
    }

    if let AnalysisRecord::Task(task) = record {
        properties["Due Date"] = json!({ "date": { "start": task.due_date.map(|d| d.to_rfc3339()) } });
        properties["Duration"] = json!({ "select": { "name": task.duration_category.to_string() } });
    }

    properties
}

fn build_children(content: &str, chunk_chars: usize) -> Value {
    let blocks: Vec<Value> = chunk_content(content, chunk_chars)
        .into_iter()
        .map(|chunk| {
            json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": { "rich_text": [{ "type": "text", "text": { "content": chunk } }] }
            })
        })
        .collect();
    Value::Array(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AnalysisCommon, NoteRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingClient {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl DocumentStoreClient for CountingClient {
        async fn create_page(&self, _database_id: &str, _properties: Value, _children: Value) -> Result<String, StoreError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(StoreError::Transient("hiccup".to_string()));
            }
            Ok("page-123".to_string())
        }

        async fn retrieve_page(&self, _page_id: &str) -> Result<Value, StoreError> {
            unimplemented!()
        }

        async fn query_database(&self, _database_id: &str) -> Result<Vec<Value>, StoreError> {
            unimplemented!()
        }
    }

    fn note_record() -> AnalysisRecord {
        AnalysisRecord::Note(NoteRecord {
            common: AnalysisCommon {
                title: "Meeting notes".to_string(),
                icon: "\u{1F4DD}".to_string(),
                content: "some content".to_string(),
                project_name: Some("Life Admin HQ".to_string()),
                tags: vec![],
                confidence: 0.9,
                preserved_flag: false,
                word_count: 2,
                manual_review_flag: false,
                metadata: Default::default(),
                store_entry_id: None,
            },
        })
    }

    #[tokio::test]
    async fn test_commit_sets_store_entry_id_on_success() {
        let client = CountingClient { calls: Arc::new(AtomicUsize::new(0)), fail_first: false };
        let writer = StoreWriter::new(
            client,
            RetryPolicy::new(3, std::time::Duration::from_millis(1)),
            StoreConfig { tasks_database_id: "tasks".to_string(), notes_database_id: "notes".to_string(), chunk_chars: 1800 },
        );
        let mut record = note_record();
        let id = writer.commit(&mut record).await.unwrap();
        assert_eq!(id, "page-123");
        assert_eq!(record.store_entry_id(), Some("page-123"));
    }

    #[tokio::test]
    async fn test_commit_retries_transient_failure() {
        let client = CountingClient { calls: Arc::new(AtomicUsize::new(0)), fail_first: true };
        let calls = client.calls.clone();
        let writer = StoreWriter::new(
            client,
            RetryPolicy::new(3, std::time::Duration::from_millis(1)),
            StoreConfig { tasks_database_id: "tasks".to_string(), notes_database_id: "notes".to_string(), chunk_chars: 1800 },
        );
        let mut record = note_record();
        writer.commit(&mut record).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_build_children_chunks_long_content() {
        let long = "word ".repeat(1000);
        let children = build_children(&long, 1800);
        assert!(children.as_array().unwrap().len() > 1);
    }
}
