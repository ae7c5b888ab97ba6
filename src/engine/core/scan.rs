use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions treated as video when scanning a directory
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "webm", "mov", "avi", "flv", "m4v", "wmv", "ts", "m2ts",
];

/// Check if a path has a video file extension
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Walk `root` recursively and call `on_file` for each video file.
/// Symlinks are not followed.
pub fn scan_streaming<F>(root: &Path, mut on_file: F)
where
    F: FnMut(PathBuf),
{
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && is_video_file(path) {
            on_file(path.to_path_buf());
        }
    }
}

/// Video files under `root`, sorted
pub fn scan(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    scan_streaming(root, |path| files.push(path));
    files.sort();
    files
}

/// Sibling output path `<stem>.<suffix>.<container>` in `output_dir` (or next to the input)
pub fn derive_output_path(
    input: &Path,
    output_dir: Option<&Path>,
    suffix: &str,
    container: &str,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = if suffix.is_empty() {
        format!("{}.{}", stem, container)
    } else {
        format!("{}.{}.{}", stem, suffix, container)
    };
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(name)
}
