//! Destination naming for received files.
//!
//! Offered names come from the remote peer and are reduced to a single path
//! component before they touch the filesystem. Existing files are never
//! overwritten: a `_N` suffix is inserted before the extension instead.

use std::path::Path;

use tokio::fs::{File, OpenOptions};

use crate::TransferError;

/// Upper bound on `_N` suffixes tried before giving up.
const MAX_SUFFIX: u32 = 10_000;

/// Reduces a peer-supplied file name to a bare file name.
///
/// Directory parts (either separator) are stripped. Rejects:
/// - Empty names, `.` and `..`
/// - Names containing NUL
/// - Windows drive prefixes (`C:`)
pub fn sanitize_file_name(offered: &str) -> Result<String, TransferError> {
    if offered.contains('\0') {
        return Err(TransferError::InvalidFileName(
            "NUL byte in file name".into(),
        ));
    }

    let name = offered
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(TransferError::InvalidFileName(format!(
            "no usable file name in {offered:?}"
        )));
    }

    if name.len() >= 2 && name.as_bytes()[1] == b':' && name.as_bytes()[0].is_ascii_alphabetic()
    {
        return Err(TransferError::InvalidFileName(format!(
            "drive prefix not allowed: {offered}"
        )));
    }

    Ok(name.to_string())
}

/// Returns the `n`-th candidate for `file_name` (0 = the name itself).
///
/// `report.pdf` becomes `report_1.pdf`, `README` becomes `README_1`.
fn candidate_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }

    let path = Path::new(file_name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|e| e.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{stem}_{n}.{ext}"),
        _ => format!("{file_name}_{n}"),
    }
}

/// Creates a fresh file for `file_name` under `dir` without clobbering.
///
/// `dir` is created if missing. Returns the open file and the on-disk name.
pub(crate) async fn create_download_file(
    dir: &Path,
    file_name: &str,
) -> Result<(File, String), TransferError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(TransferError::file)?;

    for n in 0..=MAX_SUFFIX {
        let name = candidate_name(file_name, n);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await
        {
            Ok(file) => return Ok((file, name)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(TransferError::file(e)),
        }
    }

    Err(TransferError::FileIo(format!(
        "no free name for {file_name} in {}",
        dir.display()
    )))
}
