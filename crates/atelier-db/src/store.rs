use anyhow::Result;
use serde_json::Value;

use crate::path::TreePath;

/// Path-addressed access to the hierarchical tree.
///
/// A missing path reads as `None` and deleting it is a no-op; only I/O and
/// decoding failures are errors.
pub trait TreeStore: Send + Sync {
    fn get(&self, path: &TreePath) -> Result<Option<Value>>;

    /// Writes `value` at `path`, creating intermediate nodes. Writing `null`
    /// deletes the path.
    fn set(&self, path: &TreePath, value: Value) -> Result<()>;

    /// Removes `path` and prunes any ancestors left empty.
    fn delete(&self, path: &TreePath) -> Result<()>;
}
