use std::path;

/// Whether `header` begins with the gzip magic bytes
pub fn is_gzipped(header: &[u8]) -> bool {
    header.starts_with(b"\x1f\x8b")
}

/// Whether `path` carries a `.gz` extension, and the path with that extension removed
pub fn is_gzipped_extension(path: &path::Path) -> (bool, path::PathBuf) {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("gz") => (true, path.with_extension("")),
        _ => (false, path.to_path_buf()),
    }
}
