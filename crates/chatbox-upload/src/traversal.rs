use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::accept::AcceptFilter;
use crate::contracts::UploadError;
use crate::controller::SelectedFile;

/// Turns a drop onto the composer into selectable files.
///
/// A single directory is walked recursively. Otherwise every dropped entry
/// must be a plain file. Names the filter rejects are skipped in both cases.
pub fn collect_dropped(
    paths: &[PathBuf],
    filter: &AcceptFilter,
) -> Result<Vec<SelectedFile>, UploadError> {
    if let [single] = paths {
        if single.is_dir() {
            let mut files = Vec::new();
            walk(single, filter, &mut files)?;
            return Ok(files);
        }
    }

    if let Some(odd) = paths.iter().find(|path| !path.is_file()) {
        return Err(UploadError::UnsupportedDrop(format!(
            "{} is not a file; drop one folder or only files",
            odd.display()
        )));
    }
    let mut files = Vec::new();
    for path in paths {
        push_if_accepted(path, filter, &mut files)?;
    }
    Ok(files)
}

fn walk(dir: &Path, filter: &AcceptFilter, out: &mut Vec<SelectedFile>) -> Result<(), UploadError> {
    let entries = std::fs::read_dir(dir).map_err(|err| UploadError::io(dir, err))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| UploadError::io(dir, err))?;
        let file_type = entry.file_type().map_err(|err| UploadError::io(&entry.path(), err))?;
        paths.push((entry.path(), file_type));
    }
    paths.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (path, file_type) in paths {
        if file_type.is_dir() {
            walk(&path, filter, out)?;
        } else if file_type.is_symlink() {
            // Linked folders are not entered.
            if path.is_file() {
                push_if_accepted(&path, filter, out)?;
            } else {
                debug!(link = %path.display(), "skipping linked folder");
            }
        } else if file_type.is_file() {
            push_if_accepted(&path, filter, out)?;
        }
    }
    Ok(())
}

fn push_if_accepted(
    path: &Path,
    filter: &AcceptFilter,
    out: &mut Vec<SelectedFile>,
) -> Result<(), UploadError> {
    let file = SelectedFile::from_path(path)?;
    if filter.accepts(&file.name) {
        out.push(file);
    } else {
        debug!(file = %path.display(), "dropped file not accepted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chatbox_core::UploadConfig;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    fn filter() -> AcceptFilter {
        AcceptFilter::from_config(&UploadConfig::default()).expect("filter")
    }

    fn names(files: &[SelectedFile]) -> Vec<&str> {
        files.iter().map(|file| file.name.as_str()).collect()
    }

    #[test]
    fn single_folder_is_walked_recursively() {
        let dir = tempdir().expect("tmpdir");
        let nested = dir.path().join("docs").join("deep");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(dir.path().join("docs").join("a.txt"), "a").expect("write");
        std::fs::write(nested.join("b.pdf"), "b").expect("write");
        std::fs::write(nested.join("skip.exe"), "x").expect("write");

        let files = collect_dropped(&[dir.path().join("docs")], &filter()).expect("collect");

        assert_eq!(names(&files), vec!["a.txt", "b.pdf"]);
    }

    #[test]
    fn loose_files_are_filtered() {
        let dir = tempdir().expect("tmpdir");
        let keep = dir.path().join("photo.png");
        let skip = dir.path().join("tool.exe");
        std::fs::write(&keep, "p").expect("write");
        std::fs::write(&skip, "t").expect("write");

        let files = collect_dropped(&[keep, skip], &filter()).expect("collect");

        assert_eq!(names(&files), vec!["photo.png"]);
    }

    #[test]
    fn folder_mixed_with_files_is_rejected() {
        let dir = tempdir().expect("tmpdir");
        let folder = dir.path().join("folder");
        std::fs::create_dir(&folder).expect("mkdir");
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "a").expect("write");

        let err = collect_dropped(&[folder, file], &filter()).expect_err("rejected");
        assert!(matches!(err, UploadError::UnsupportedDrop(_)));
    }

    #[cfg(unix)]
    #[test]
    fn linked_folder_back_into_the_tree_is_not_followed() {
        let dir = tempdir().expect("tmpdir");
        let docs = dir.path().join("docs");
        std::fs::create_dir(&docs).expect("mkdir");
        std::fs::write(docs.join("a.txt"), "a").expect("write");
        std::os::unix::fs::symlink(&docs, docs.join("loop")).expect("symlink");

        let files = collect_dropped(&[docs], &filter()).expect("collect");

        assert_eq!(names(&files), vec!["a.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn linked_file_inside_folder_is_kept() {
        let dir = tempdir().expect("tmpdir");
        let outside = dir.path().join("notes.md");
        std::fs::write(&outside, "n").expect("write");
        let docs = dir.path().join("docs");
        std::fs::create_dir(&docs).expect("mkdir");
        std::os::unix::fs::symlink(&outside, docs.join("notes.md")).expect("symlink");

        let files = collect_dropped(&[docs], &filter()).expect("collect");

        assert_eq!(names(&files), vec!["notes.md"]);
    }
}
