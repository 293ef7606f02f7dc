//! Single-file tar archives as produced by the container copy endpoint.

use super::{CredentialError, Result};
use std::io::Read;
use std::path::Path;

/// Name a file at `path` gets inside a copied archive: its base name.
pub fn entry_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Read the only entry of `raw`, which must be named `expected`.
///
/// Nothing is returned unless the whole archive has been checked.
///
/// # Errors
///
/// Returns error if the archive is unreadable, empty, holds more than one entry,
/// or its entry has a different name.
pub fn read_single_file(raw: &[u8], expected: &str) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(raw);
    let mut entries = archive.entries()?;

    let mut entry = entries
        .next()
        .ok_or_else(|| CredentialError::EmptyArchive {
            expected: expected.to_string(),
        })??;

    let found = entry.path()?.to_string_lossy().into_owned();
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    drop(entry);

    if entries.next().is_some() {
        return Err(CredentialError::ExtraEntries {
            expected: expected.to_string(),
        });
    }

    if found.trim_start_matches("./") != expected {
        return Err(CredentialError::UnexpectedEntry {
            expected: expected.to_string(),
            found,
        });
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_of(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o666);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name("/output/kubeconfig.yaml"), "kubeconfig.yaml");
        assert_eq!(entry_name("kubeconfig.yaml"), "kubeconfig.yaml");
        assert_eq!(entry_name("/"), "/");
    }

    #[test]
    fn test_single_entry() {
        let raw = archive_of(&[("kubeconfig.yaml", b"apiVersion: v1\n")]);
        let data = read_single_file(&raw, "kubeconfig.yaml").unwrap();
        assert_eq!(data, b"apiVersion: v1\n");
    }

    #[test]
    fn test_two_entries_rejected() {
        let raw = archive_of(&[
            ("kubeconfig.yaml", b"apiVersion: v1\n"),
            ("other.yaml", b"kind: Config\n"),
        ]);
        let err = read_single_file(&raw, "kubeconfig.yaml").unwrap_err();
        assert!(matches!(err, CredentialError::ExtraEntries { .. }));
        assert!(err.to_string().contains("only contain kubeconfig.yaml"));
    }

    #[test]
    fn test_mismatched_name_rejected() {
        let raw = archive_of(&[("config.yaml", b"apiVersion: v1\n")]);
        let err = read_single_file(&raw, "kubeconfig.yaml").unwrap_err();
        match err {
            CredentialError::UnexpectedEntry { expected, found } => {
                assert_eq!(expected, "kubeconfig.yaml");
                assert_eq!(found, "config.yaml");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_archive_rejected() {
        let raw = archive_of(&[]);
        let err = read_single_file(&raw, "kubeconfig.yaml").unwrap_err();
        assert!(matches!(err, CredentialError::EmptyArchive { .. }));
    }
}
