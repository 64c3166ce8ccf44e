//! Track paths and file-name rules used while building the catalog.

use platform::NodeName;

/// Absolute path of a track on the mounted volume (at most `PATH_LENGTH` bytes).
pub type TrackPath = NodeName;

/// Returns `true` for the `.` and `..` directory entries.
pub fn is_reserved_name(name: &str) -> bool {
    name == "." || name == ".."
}

/// Returns `true` when `name` carries an extension the engine can play.
///
/// The comparison is case-insensitive: FAT volumes written by other systems
/// frequently store `TRACK01.WAV`. `.mp3` is accepted only with the `mp3`
/// feature.
pub fn is_supported_name(name: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }
    ext.eq_ignore_ascii_case("wav") || (cfg!(feature = "mp3") && ext.eq_ignore_ascii_case("mp3"))
}

/// Join a directory path and an entry name into `out`.
///
/// Returns `false` when the result does not fit into a [`TrackPath`]; `out`
/// is left in an unspecified state in that case.
pub fn join_path(base: &str, name: &str, out: &mut TrackPath) -> bool {
    out.clear();
    let separator = if base.ends_with('/') { "" } else { "/" };
    out.push_str(base).is_ok() && out.push_str(separator).is_ok() && out.push_str(name).is_ok()
}

/// Build an arena of empty track paths for [`TrackCatalog`](crate::TrackCatalog).
///
/// On hardware the arena belongs in a `static` (it is `N * PATH_LENGTH`
/// bytes); tests can keep small arenas on the stack.
pub fn path_arena<const N: usize>() -> [TrackPath; N] {
    core::array::from_fn(|_| TrackPath::new())
}
