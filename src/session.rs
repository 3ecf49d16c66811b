//! Layering of pending changes over a base driver.

use crate::drivers::{ChangeDriver, TexelDriver};
use crate::merge::merge_texels;
use crate::types::Texel;
use eyre::{Context, Result};

/// Texels of a project as the user sees them: base content with pending changes on top.
pub async fn merged_list(base: &dyn TexelDriver, changes: &ChangeDriver, id: &str) -> Result<Vec<Texel>> {
    let (committed, pending) = futures::try_join!(base.list(id), changes.list(id))?;
    Ok(merge_texels([committed, pending]))
}

/// Write all pending changes of a project to the base driver, then forget them.
///
/// Returns the number of committed changes. Pending changes are kept if the
/// base write fails.
pub async fn commit_pending(base: &dyn TexelDriver, changes: &ChangeDriver, id: &str) -> Result<usize> {
    let pending = changes.list(id).await?;
    if pending.is_empty() {
        return Ok(0);
    }

    let count = pending.len();
    base.update(id, pending)
        .await
        .wrap_err_with(|| format!("Failed to commit pending changes of {}", id))?;
    changes.clear(id)?;

    log::info!("committed {} pending change(s) of {}", count, id);
    Ok(count)
}
