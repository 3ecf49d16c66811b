//! Merge and diff algorithms over texel lists.

use crate::files::FileCodec;
use crate::types::{Texel, TexelId};
use eyre::Result;
use std::collections::{HashMap, HashSet};

/// Merge texel lists with last-write-wins per identity.
///
/// Lists are applied in argument order. A tombstone removes the entry, any
/// other texel inserts or overwrites it. Only surviving values are returned,
/// in the order their identity was first seen.
pub fn merge_texels<I, L>(lists: I) -> Vec<Texel>
where
    I: IntoIterator<Item = L>,
    L: IntoIterator<Item = Texel>,
{
    let mut order: Vec<TexelId> = Vec::new();
    let mut entries: HashMap<TexelId, Texel> = HashMap::new();

    for texel in lists.into_iter().flatten() {
        let id = texel.id();
        if texel.is_tombstone() {
            entries.remove(&id);
        } else {
            if !entries.contains_key(&id) {
                order.push(id.clone());
            }
            entries.insert(id, texel);
        }
    }

    order.into_iter().filter_map(|id| entries.remove(&id)).collect()
}

/// Returns the texels of `base` whose identity is absent from `to_remove`.
///
/// Values are not compared: an entry present in both lists with a different
/// value is dropped as well.
pub fn subtract_texels(base: Vec<Texel>, to_remove: &[Texel]) -> Vec<Texel> {
    let removed: HashSet<TexelId> = to_remove.iter().map(Texel::id).collect();
    base.into_iter().filter(|texel| !removed.contains(&texel.id())).collect()
}

/// Group changes by the file path they belong to.
///
/// Groups keep the order in which paths are first seen; changes keep their
/// relative order within a group.
pub fn group_by_path(codec: &FileCodec, changes: Vec<Texel>) -> Result<Vec<(String, Vec<Texel>)>> {
    let mut groups: Vec<(String, Vec<Texel>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for change in changes {
        let path = codec.domain_to_path(&change.domain, &change.locale)?;
        match index.get(&path) {
            Some(&i) => groups[i].1.push(change),
            None => {
                index.insert(path.clone(), groups.len());
                groups.push((path, vec![change]));
            }
        }
    }

    Ok(groups)
}
