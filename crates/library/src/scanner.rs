//! Scanner — walks the mounted volume and fills a [`TrackCatalog`].
//!
//! The walk is depth-first in directory order, descends at most
//! [`SCAN_MAX_DEPTH`] levels below the root and keeps every non-empty file
//! with a playable extension. Listing calls are retried on transient
//! failures; a directory that keeps failing is abandoned, the rest of the
//! volume is still scanned.

use platform::config::SCAN_MAX_DEPTH;
use platform::{with_retries, FileSystem, FsError, FsNode, NodeName};
use rand_core::RngCore;

use crate::catalog::{CatalogError, TrackCatalog};
use crate::track::{is_reserved_name, is_supported_name, join_path, TrackPath};

/// Order applied to the catalog once the walk is complete.
pub enum TrackOrder<'r> {
    /// Byte-wise lexicographic order of the full path.
    Lexical,
    /// Random order drawn from the given source.
    Shuffled(&'r mut dyn RngCore),
}

impl TrackOrder<'_> {
    /// Returns `true` for [`TrackOrder::Shuffled`].
    pub fn is_shuffled(&self) -> bool {
        matches!(self, Self::Shuffled(_))
    }
}

/// Clear `catalog`, rescan `fs` from its root and order the result.
///
/// Returns the number of tracks found. Only a failure to open the root is
/// reported as an error; once the catalog is full further entries are
/// silently dropped.
pub fn scan_tree<F: FileSystem>(
    fs: &mut F,
    catalog: &mut TrackCatalog<'_>,
    order: TrackOrder<'_>,
) -> Result<usize, FsError> {
    catalog.clear();

    let mut root = fs.root().map_err(|e| {
        warn!("scan: cannot open root: {}", e.as_str());
        e
    })?;
    scan_node(&mut root, "/", 0, catalog);
    drop(root);

    let shuffled = order.is_shuffled();
    match order {
        TrackOrder::Lexical => catalog.sort(),
        TrackOrder::Shuffled(rng) => catalog.shuffle(rng),
    }

    info!(
        "scan: {} tracks (capacity {}, shuffled {})",
        catalog.len(),
        catalog.capacity(),
        shuffled
    );
    Ok(catalog.len())
}

fn scan_node<N: FsNode>(dir: &mut N, base: &str, level: usize, catalog: &mut TrackCatalog<'_>) {
    let mut child = match with_retries(|| dir.first_child()) {
        Ok(child) => child,
        Err(FsError::NoEntry) => return,
        Err(e) => {
            warn!("scan: cannot list {}: {}", base, e.as_str());
            return;
        }
    };

    let mut name = NodeName::new();
    let mut path = TrackPath::new();

    while !catalog.is_full() {
        match with_retries(|| child.name(&mut name)) {
            Ok(()) if !is_reserved_name(&name) => {
                if join_path(base, &name, &mut path) {
                    visit(&mut child, &path, &name, level, catalog);
                } else {
                    debug!("scan: path too long under {}", base);
                }
            }
            Ok(()) => {}
            Err(e) => debug!("scan: skipping unnamed entry under {}: {}", base, e.as_str()),
        }

        match with_retries(|| child.advance()) {
            Ok(()) => {}
            Err(FsError::NoEntry) => break,
            Err(e) => {
                warn!("scan: listing of {} aborted: {}", base, e.as_str());
                break;
            }
        }
    }
}

fn visit<N: FsNode>(
    node: &mut N,
    path: &str,
    name: &str,
    level: usize,
    catalog: &mut TrackCatalog<'_>,
) {
    if !node.has_data() {
        if level < SCAN_MAX_DEPTH {
            scan_node(node, path, level.saturating_add(1), catalog);
        }
        return;
    }
    if !is_supported_name(name) {
        return;
    }

    match with_retries(|| node.length()) {
        Ok(length) if length > 0 => match catalog.push(path) {
            Ok(()) => trace!("scan: + {}", path),
            Err(CatalogError::Full) => debug!("scan: catalog full, dropping {}", path),
            Err(CatalogError::PathTooLong) => debug!("scan: path too long: {}", path),
        },
        Ok(_) => trace!("scan: empty file {}", path),
        Err(e) => debug!("scan: cannot stat {}: {}", path, e.as_str()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::track::path_arena;
    use platform::mocks::MemoryFs;

    fn lexical(fs: &mut MemoryFs, arena: &mut [TrackPath]) -> Vec<String> {
        let mut catalog = TrackCatalog::new(arena);
        scan_tree(fs, &mut catalog, TrackOrder::Lexical).unwrap();
        catalog.iter().map(str::to_string).collect()
    }

    #[test]
    fn scan_collects_supported_files_in_order() {
        let mut fs = MemoryFs::new();
        fs.add_file("/b.wav", vec![1; 8])
            .add_file("/cover.jpg", vec![1; 8])
            .add_file("/a.wav", vec![1; 8]);
        let mut arena = path_arena::<8>();
        assert_eq!(lexical(&mut fs, &mut arena), ["/a.wav", "/b.wav"]);
    }

    #[test]
    fn empty_files_are_skipped() {
        let mut fs = MemoryFs::new();
        fs.add_file("/silent.wav", Vec::new()).add_file("/a.wav", vec![1; 4]);
        let mut arena = path_arena::<8>();
        assert_eq!(lexical(&mut fs, &mut arena), ["/a.wav"]);
    }

    #[test]
    fn depth_is_limited_to_two_levels() {
        let mut fs = MemoryFs::new();
        fs.add_file("/one/two/deep.wav", vec![1; 4])
            .add_file("/one/two/three/too_deep.wav", vec![1; 4])
            .add_file("/one/shallow.wav", vec![1; 4]);
        let mut arena = path_arena::<8>();
        assert_eq!(
            lexical(&mut fs, &mut arena),
            ["/one/shallow.wav", "/one/two/deep.wav"]
        );
    }

    #[test]
    fn root_failure_is_reported() {
        let mut fs = MemoryFs::new();
        fs.add_file("/a.wav", vec![1; 4]);
        fs.break_root(true);
        let mut arena = path_arena::<4>();
        let mut catalog = TrackCatalog::new(&mut arena);
        catalog.push("/stale.wav").unwrap();
        assert_eq!(
            scan_tree(&mut fs, &mut catalog, TrackOrder::Lexical),
            Err(FsError::Io)
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn transient_listing_failures_are_retried() {
        let mut fs = MemoryFs::new();
        fs.add_file("/a.wav", vec![1; 4]);
        fs.fail_next_listings(2);
        let mut arena = path_arena::<4>();
        assert_eq!(lexical(&mut fs, &mut arena), ["/a.wav"]);
    }

    #[test]
    fn nodes_are_released_after_the_scan() {
        let mut fs = MemoryFs::new();
        fs.add_file("/x/y/a.wav", vec![1; 4]).add_file("/b.wav", vec![1; 4]);
        let mut arena = path_arena::<4>();
        lexical(&mut fs, &mut arena);
        assert_eq!(fs.live_nodes(), 0);
    }
}
