use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::info;

use atelier_db::{Database, TreePath, TreeStore};

use crate::providers::BlobStorage;
use crate::storage::DirectoryBlobStorage;

/// The whole tree as one JSON object keyed by top-level node.
pub fn dump(db: &Database) -> Result<Value> {
    let mut roots = Map::new();
    for node in db.list_nodes()? {
        let body: Value = serde_json::from_str(&node.body)
            .with_context(|| format!("Corrupt node {} (updated {})", node.root, node.updated_at))?;
        roots.insert(node.root, body);
    }
    Ok(Value::Object(roots))
}

/// Writes every top-level node of `snapshot` into the store, replacing
/// existing nodes of the same name. Returns the number of nodes written.
pub fn load<S: TreeStore + ?Sized>(store: &S, snapshot: Value) -> Result<usize> {
    let Value::Object(roots) = snapshot else {
        anyhow::bail!("Snapshot must be a JSON object keyed by top-level node");
    };

    let count = roots.len();
    for (root, body) in roots {
        store.set(&TreePath::parse(&root), body)?;
    }
    info!("Loaded {} top-level nodes", count);
    Ok(count)
}

/// Copies every blob of `source` into `target`. Returns the number copied.
pub async fn mirror_storage(source: &dyn BlobStorage, target: &DirectoryBlobStorage) -> Result<usize> {
    let names = source.list("").await?;
    for name in &names {
        let data = source.read(name).await?;
        target.write(name, &data).await?;
    }
    info!("Mirrored {} files into {}", names.len(), target.dir().display());
    Ok(names.len())
}
