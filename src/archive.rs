// ABOUTME: Archive installer for the revelation application
// ABOUTME: Downloads asset bundles, extracts them defensively and merges them into place

use crate::errors::{RevelationError, Result};
use flate2::read::GzDecoder;
use log::{debug, info};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use url::Url;
use walkdir::WalkDir;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGICS: [[u8; 4]; 3] = [*b"PK\x03\x04", *b"PK\x05\x06", *b"PK\x07\x08"];

/// Container formats an asset bundle may come in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// gzip-compressed tarball
    Tar,
    Zip,
}

/// A downloaded bundle waiting to be installed.
/// The temporary download is deleted when the bundle is dropped.
pub struct AssetBundle {
    pub url: String,
    pub format: ArchiveFormat,
    file: NamedTempFile,
}

impl AssetBundle {
    /// Download `url` and check that it is an archive we can unpack
    pub fn fetch(url: &str, timeout: Duration) -> Result<Self> {
        let file = download(url, timeout)?;
        let format = detect_format(file.path())?;
        debug!("Bundle {} detected as {:?}", url, format);

        Ok(Self {
            url: url.to_string(),
            format,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Extract into a scratch directory and merge the bundle's top-level
    /// directory into `target`. Scratch space and download are removed
    /// afterwards, whether or not the install succeeded.
    pub fn install_into(self, target: &Path) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix("revelation-extract-")
            .tempdir()?;

        let extracted_root = safe_extract(self.path(), scratch.path())?;
        install(&extracted_root, target)?;

        info!("Installed {} into {:?}", self.url, target);
        Ok(())
    }
}

/// Download, extract and install the bundle at `url` into `target`
pub fn install_bundle(url: &str, target: &Path, timeout: Duration) -> Result<()> {
    AssetBundle::fetch(url, timeout)?.install_into(target)
}

/// Fetch `url` into a temporary file. No retries: a network failure, a
/// timeout or a non-success status is reported as a download error.
pub fn download(url: &str, timeout: Duration) -> Result<NamedTempFile> {
    let parsed = Url::parse(url).map_err(|e| RevelationError::Download {
        url: url.to_string(),
        message: "invalid URL".to_string(),
        source: Some(Box::new(e)),
    })?;

    info!("Downloading {}", url);

    let client = Client::builder().timeout(timeout).build()?;
    let mut response = client.get(parsed).send()?;

    if !response.status().is_success() {
        return Err(RevelationError::download(
            url,
            format!("HTTP error: {}", response.status()),
        ));
    }

    let mut file = tempfile::Builder::new()
        .prefix("revelation-download-")
        .tempfile()?;
    let bytes = response.copy_to(file.as_file_mut())?;
    debug!("Downloaded {} bytes to {:?}", bytes, file.path());

    Ok(file)
}

/// Identify the archive format from the file signature
pub fn detect_format(path: &Path) -> Result<ArchiveFormat> {
    let mut header = Vec::with_capacity(4);
    File::open(path)?.take(4).read_to_end(&mut header)?;

    if header.starts_with(&GZIP_MAGIC) {
        Ok(ArchiveFormat::Tar)
    } else if ZIP_MAGICS.iter().any(|magic| header == magic) {
        Ok(ArchiveFormat::Zip)
    } else {
        Err(RevelationError::UnsupportedFormat(path.to_path_buf()))
    }
}

/// An archive member as seen before anything is written
struct EntryName {
    name: String,
    link: Option<Link>,
}

enum Link {
    /// Resolved relative to the directory holding the entry
    Symbolic(String),
    /// Resolved relative to the archive root
    Hard(String),
}

/// Extract every entry of `archive` under `destination` and return the path
/// of the top-level directory named by the first entry.
///
/// All entry names, and tar link targets, are checked before the first byte
/// is written. One entry resolving outside `destination` aborts the whole
/// extraction with [`RevelationError::PathTraversal`]. While unpacking, each
/// entry's parent is resolved on disk again, so a chain of symlinks unpacked
/// by earlier entries cannot carry a later one outside either.
pub fn safe_extract(archive: &Path, destination: &Path) -> Result<PathBuf> {
    let format = detect_format(archive)?;

    let entries = match format {
        ArchiveFormat::Tar => tar_entries(archive)?,
        ArchiveFormat::Zip => zip_entries(archive)?,
    };

    let first = entries.first().ok_or_else(|| RevelationError::Install {
        message: format!("archive {:?} is empty", archive),
        source: None,
    })?;
    let top_level = top_level_name(&first.name).ok_or_else(|| RevelationError::Install {
        message: format!("cannot infer the bundle directory from entry {:?}", first.name),
        source: None,
    })?;

    for entry in &entries {
        let resolved = resolve_entry(&[], &entry.name)
            .ok_or_else(|| traversal(&entry.name, destination))?;

        let escapes = match &entry.link {
            Some(Link::Symbolic(target)) => {
                let parent = &resolved[..resolved.len().saturating_sub(1)];
                resolve_entry(parent, target).is_none()
            }
            Some(Link::Hard(target)) => resolve_entry(&[], target).is_none(),
            None => false,
        };
        if escapes {
            return Err(traversal(&entry.name, destination));
        }
    }

    fs::create_dir_all(destination)?;
    info!(
        "Extracting {} entries from {:?} into {:?}",
        entries.len(),
        archive,
        destination
    );

    match format {
        ArchiveFormat::Tar => unpack_tar(archive, destination)?,
        ArchiveFormat::Zip => unpack_zip(archive, destination)?,
    }

    Ok(destination.join(top_level))
}

fn traversal(entry: &str, destination: &Path) -> RevelationError {
    RevelationError::PathTraversal {
        entry: entry.to_string(),
        destination: destination.to_path_buf(),
    }
}

/// Lexically resolve `name` against `base` (components below the extraction
/// root). Returns `None` if the result is absolute or climbs above the root.
fn resolve_entry(base: &[String], name: &str) -> Option<Vec<String>> {
    if name.starts_with('/') || name.starts_with('\\') || has_drive_prefix(name) {
        return None;
    }

    let mut components = base.to_vec();
    for part in name.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                components.pop()?;
            }
            other => components.push(other.to_string()),
        }
    }

    Some(components)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn top_level_name(name: &str) -> Option<String> {
    resolve_entry(&[], name).and_then(|components| components.into_iter().next())
}

fn output_path(destination: &Path, name: &str) -> Result<PathBuf> {
    let components =
        resolve_entry(&[], name).ok_or_else(|| traversal(name, destination))?;
    Ok(components
        .iter()
        .fold(destination.to_path_buf(), |path, part| path.join(part)))
}

fn open_tar(archive: &Path) -> Result<tar::Archive<GzDecoder<File>>> {
    Ok(tar::Archive::new(GzDecoder::new(File::open(archive)?)))
}

fn tar_entries(archive: &Path) -> Result<Vec<EntryName>> {
    let mut tarball = open_tar(archive)?;
    let mut names = Vec::new();

    for entry in tarball.entries().map_err(|e| tar_error(archive, e))? {
        let entry = entry.map_err(|e| tar_error(archive, e))?;
        let entry_type = entry.header().entry_type();
        if is_metadata(entry_type) {
            continue;
        }
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

        let link = entry
            .link_name_bytes()
            .map(|target| String::from_utf8_lossy(&target).into_owned())
            .and_then(|target| {
                if entry_type.is_symlink() {
                    Some(Link::Symbolic(target))
                } else if entry_type.is_hard_link() {
                    Some(Link::Hard(target))
                } else {
                    None
                }
            });

        names.push(EntryName { name, link });
    }

    Ok(names)
}

/// Pax and GNU extension headers describe the next entry (or the whole
/// archive) and are not members themselves
fn is_metadata(entry_type: tar::EntryType) -> bool {
    entry_type.is_pax_global_extensions()
        || entry_type.is_pax_local_extensions()
        || entry_type.is_gnu_longname()
        || entry_type.is_gnu_longlink()
}

fn unpack_tar(archive: &Path, destination: &Path) -> Result<()> {
    let root = destination.canonicalize()?;
    let mut tarball = open_tar(archive)?;

    for entry in tarball.entries().map_err(|e| tar_error(archive, e))? {
        let mut entry = entry.map_err(|e| tar_error(archive, e))?;
        if is_metadata(entry.header().entry_type()) {
            continue;
        }
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let out = output_path(destination, &name)?;
        check_contained(&root, &out, &name, destination)?;

        // unpack_in resolves hard link sources against the destination and
        // refuses parents that canonicalize outside of it
        let unpacked = entry
            .unpack_in(destination)
            .map_err(|e| RevelationError::install(format!("failed to unpack {:?}", name), e))?;
        if !unpacked {
            return Err(traversal(&name, destination));
        }
    }

    Ok(())
}

/// Refuse `out` when its nearest existing ancestor resolves outside `root`,
/// as happens when an earlier entry planted a symlink on the way.
fn check_contained(root: &Path, out: &Path, name: &str, destination: &Path) -> Result<()> {
    let mut ancestor = out.parent();
    while let Some(dir) = ancestor {
        if dir.symlink_metadata().is_ok() {
            break;
        }
        ancestor = dir.parent();
    }

    let inside = ancestor
        .and_then(|dir| dir.canonicalize().ok())
        .map_or(false, |dir| dir.starts_with(root));

    if inside {
        Ok(())
    } else {
        Err(traversal(name, destination))
    }
}

fn tar_error(archive: &Path, err: io::Error) -> RevelationError {
    RevelationError::install(format!("failed to read tarball {:?}", archive), err)
}

fn zip_entries(archive: &Path) -> Result<Vec<EntryName>> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    let mut names = Vec::with_capacity(zip.len());

    for index in 0..zip.len() {
        let file = zip.by_index_raw(index)?;
        names.push(EntryName {
            name: file.name().to_string(),
            link: None,
        });
    }

    Ok(names)
}

fn unpack_zip(archive: &Path, destination: &Path) -> Result<()> {
    let root = destination.canonicalize()?;
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;

    for index in 0..zip.len() {
        let mut file = zip.by_index(index)?;
        let out = output_path(destination, file.name())?;
        check_contained(&root, &out, file.name(), destination)?;

        if file.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }

        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = File::create(&out)?;
        io::copy(&mut file, &mut output)?;

        if let Some(mode) = file.unix_mode() {
            set_mode(&out, mode)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Move every file under `extracted_root` to the same relative path under
/// `target`, replacing files already there, then delete `extracted_root`.
///
/// Running it again with the same content converges to the same tree.
/// Not transactional: a failure part way leaves old and new files mixed.
pub fn install(extracted_root: &Path, target: &Path) -> Result<()> {
    if !extracted_root.is_dir() {
        return Err(RevelationError::Install {
            message: format!("{:?} is not a directory", extracted_root),
            source: None,
        });
    }

    let entries = WalkDir::new(extracted_root)
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RevelationError::install(format!("failed to walk {:?}", extracted_root), e))?;

    info!("Installing {} entries into {:?}", entries.len(), target);

    for entry in entries {
        let relative = entry
            .path()
            .strip_prefix(extracted_root)
            .map_err(|e| RevelationError::install("entry outside of extracted tree", e))?;
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            if dest.is_file() || dest.is_symlink() {
                remove_existing(&dest)?;
            }
            fs::create_dir_all(&dest).map_err(|e| io_install("create directory", &dest, e))?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| io_install("create directory", parent, e))?;
        }
        if dest.symlink_metadata().is_ok() {
            remove_existing(&dest)?;
        }
        move_file(entry.path(), &dest)?;
    }

    fs::remove_dir_all(extracted_root)
        .map_err(|e| io_install("remove extracted tree", extracted_root, e))?;

    Ok(())
}

fn remove_existing(path: &Path) -> Result<()> {
    let result = if path.is_dir() && !path.is_symlink() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| io_install("remove", path, e))
}

/// Rename, falling back to copy and delete across filesystems
fn move_file(src: &Path, dst: &Path) -> Result<()> {
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    fs::copy(src, dst).map_err(|e| io_install("copy", src, e))?;
    fs::remove_file(src).map_err(|e| io_install("remove", src, e))
}

fn io_install(action: &str, path: &Path, err: io::Error) -> RevelationError {
    RevelationError::install(format!("failed to {} {:?}", action, path), err)
}
