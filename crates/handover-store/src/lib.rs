//! Key→JSON document storage.
//!
//! Keys are path-like (`interviews/abc123`, `snapshots/abc123/def456`) and map
//! to one JSON file per key under a data directory. Writes are whole-document
//! replacements with last-writer-wins semantics; there is no locking, which is
//! an accepted limitation for the expected single-operator usage.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Object-safe storage interface. Business logic depends on this trait so the
/// filesystem backend can be swapped for a real KV/document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document, `None` when the key is absent.
    async fn read(&self, key: &str) -> Result<Option<Value>>;
    /// Write (create or replace) a document.
    async fn write(&self, key: &str, value: Value) -> Result<()>;
    /// List the ids directly under a namespace, sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
    /// List the sub-namespaces directly under a namespace (e.g. interview ids
    /// under `snapshots/`), sorted ascending.
    async fn list_namespaces(&self, prefix: &str) -> Result<Vec<String>>;
    /// Delete one document. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool>;
    /// Delete an entire namespace and everything under it.
    async fn remove_all(&self, prefix: &str) -> Result<()>;
}

/// Typed convenience layer over the raw [`DocumentStore`] operations.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read(key).await? {
            Some(value) => match serde_json::from_value(value) {
                Ok(doc) => Ok(Some(doc)),
                Err(error) => {
                    warn!(key, %error, "stored document failed to deserialize");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn put<T: Serialize + Sync>(&self, key: &str, doc: &T) -> Result<()> {
        self.write(key, serde_json::to_value(doc)?).await
    }

    /// Load every document under a namespace, skipping unreadable entries.
    async fn get_all<T: DeserializeOwned + Send>(&self, prefix: &str) -> Result<Vec<T>> {
        let mut docs = Vec::new();
        for id in self.list(prefix).await? {
            if let Some(doc) = self.get(&format!("{prefix}/{id}")).await? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// Filesystem-backed store: `{root}/{key}.json` per document.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.dir_path(key)?.with_extension("json"))
    }

    fn dir_path(&self, key: &str) -> Result<PathBuf> {
        let rel = Path::new(key);
        if key.is_empty()
            || rel.components().any(|c| {
                !matches!(c, Component::Normal(part) if !part.to_string_lossy().starts_with('.'))
            })
        {
            bail!("invalid store key: {key}");
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let path = self.file_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        let path = self.file_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, serde_json::to_vec_pretty(&value)?).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.dir_path(prefix)?;
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn list_namespaces(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.dir_path(prefix)?;
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.file_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_all(&self, prefix: &str) -> Result<()> {
        let dir = self.dir_path(prefix)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Doc {
        id: String,
        count: u32,
    }

    fn store() -> (FsDocumentStore, TempDir) {
        let tmp = TempDir::new().expect("tempdir");
        (FsDocumentStore::new(tmp.path()), tmp)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (store, _tmp) = store();
        let doc = Doc {
            id: "a1".into(),
            count: 3,
        };
        store.put("interviews/a1", &doc).await.expect("put");

        let loaded: Option<Doc> = store.get("interviews/a1").await.expect("get");
        assert_eq!(loaded, Some(doc));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let (store, _tmp) = store();
        let loaded: Option<Doc> = store.get("interviews/missing").await.expect("get");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn write_replaces_existing_document() {
        let (store, _tmp) = store();
        let first = Doc {
            id: "a1".into(),
            count: 1,
        };
        let second = Doc {
            id: "a1".into(),
            count: 2,
        };
        store.put("topics/a1", &first).await.expect("put first");
        store.put("topics/a1", &second).await.expect("put second");

        let loaded: Option<Doc> = store.get("topics/a1").await.expect("get");
        assert_eq!(loaded.unwrap().count, 2);
    }

    #[tokio::test]
    async fn list_returns_sorted_ids() {
        let (store, _tmp) = store();
        for id in ["b", "a", "c"] {
            let doc = Doc {
                id: id.into(),
                count: 0,
            };
            store.put(&format!("topics/{id}"), &doc).await.expect("put");
        }

        let ids = store.list("topics").await.expect("list");
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn list_missing_namespace_is_empty() {
        let (store, _tmp) = store();
        assert!(store.list("nothing").await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn nested_keys_and_namespace_listing() {
        let (store, _tmp) = store();
        let doc = Doc {
            id: "s1".into(),
            count: 0,
        };
        store.put("snapshots/i1/s1", &doc).await.expect("put");
        store.put("snapshots/i1/s2", &doc).await.expect("put");
        store.put("snapshots/i2/s3", &doc).await.expect("put");

        assert_eq!(
            store.list("snapshots/i1").await.expect("list"),
            vec!["s1", "s2"]
        );
        assert_eq!(
            store.list_namespaces("snapshots").await.expect("ns"),
            vec!["i1", "i2"]
        );
    }

    #[tokio::test]
    async fn remove_reports_existence() {
        let (store, _tmp) = store();
        let doc = Doc {
            id: "a1".into(),
            count: 0,
        };
        store.put("personas/a1", &doc).await.expect("put");

        assert!(store.remove("personas/a1").await.expect("remove"));
        assert!(!store.remove("personas/a1").await.expect("remove again"));
    }

    #[tokio::test]
    async fn remove_all_clears_namespace() {
        let (store, _tmp) = store();
        let doc = Doc {
            id: "s1".into(),
            count: 0,
        };
        store.put("snapshots/i1/s1", &doc).await.expect("put");
        store.put("snapshots/i1/s2", &doc).await.expect("put");

        store.remove_all("snapshots/i1").await.expect("remove_all");
        assert!(store.list("snapshots/i1").await.expect("list").is_empty());

        // Removing a missing namespace is fine.
        store.remove_all("snapshots/i1").await.expect("idempotent");
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let (store, _tmp) = store();
        let doc = Doc {
            id: "x".into(),
            count: 0,
        };
        assert!(store.put("../escape", &doc).await.is_err());
        assert!(store.read("a/../../b").await.is_err());
        assert!(store.read("").await.is_err());
    }

    #[tokio::test]
    async fn get_all_skips_corrupt_documents() {
        let (store, tmp) = store();
        let doc = Doc {
            id: "good".into(),
            count: 1,
        };
        store.put("topics/good", &doc).await.expect("put");
        std::fs::write(tmp.path().join("topics/odd.json"), "{\"id\": 42}").expect("write corrupt");

        let docs: Vec<Doc> = store.get_all("topics").await.expect("get_all");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "good");
    }
}
