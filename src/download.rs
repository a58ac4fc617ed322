use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tar::Archive;

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetches `url` into `dest`, replacing whatever is there.
    async fn download_file(&self, url: &str, dest: &Path) -> Result<()>;
}

pub trait Extractor: Send + Sync {
    /// Unpacks `archive` into `dest_dir`, overwriting existing files.
    fn extract(&self, archive: &Path, dest_dir: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
    user_agent: String,
    show_progress: bool,
}

impl HttpDownloader {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download_file(&self, url: &str, dest: &Path) -> Result<()> {
        let filename = dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| dest.display().to_string());
        tracing::info!("Downloading {}...", filename);
        tracing::debug!("Download URL: {}", url);

        let response = self
            .client
            .get(url)
            .header("User-Agent", self.user_agent.as_str())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Download of {} was refused", url))?;
        let total_size = response.content_length().unwrap_or(0);

        let pb = if self.show_progress {
            let pb = ProgressBar::new(total_size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                    .progress_chars("#>-"),
            );
            pb.set_message(format!("Downloading {}", filename));
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut file = fs::File::create(dest)
            .with_context(|| format!("Could not create {}", dest.display()))?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("Connection dropped while fetching {}", url))?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.sync_all()?;

        pb.finish_with_message("Download complete");
        tracing::debug!("Downloaded {} bytes to {}", downloaded, dest.display());
        Ok(())
    }
}

/// Container formats recognised by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    SevenZip,
    TarGz,
    TarXz,
}

impl ArchiveKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".7z") {
            Some(ArchiveKind::SevenZip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.xz") {
            Some(ArchiveKind::TarXz)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveExtractor;

impl Extractor for ArchiveExtractor {
    fn extract(&self, archive_path: &Path, extract_dir: &Path) -> Result<()> {
        tracing::info!("Extracting {}...", archive_path.display());

        let kind = ArchiveKind::from_path(archive_path)
            .ok_or_else(|| anyhow!("Unsupported archive format: {}", archive_path.display()))?;

        fs::create_dir_all(extract_dir)?;
        match kind {
            ArchiveKind::Zip => extract_zip(archive_path, extract_dir),
            ArchiveKind::SevenZip => extract_7z(archive_path, extract_dir),
            ArchiveKind::TarGz => extract_tar_gz(archive_path, extract_dir),
            ArchiveKind::TarXz => extract_tar_xz(archive_path, extract_dir),
        }
        .with_context(|| format!("Could not extract {}", archive_path.display()))
    }
}

fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!("Skipping unsafe path in zip: {}", file.name());
            continue;
        };
        let outpath = extract_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

fn extract_7z(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    sevenz_rust::decompress_file(archive_path, extract_dir)
        .map_err(|e| anyhow!("7z extraction failed: {}", e))
}

fn extract_tar_gz(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    archive.unpack(extract_dir)?;

    Ok(())
}

fn extract_tar_xz(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let decoder = xz2::read::XzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    archive.unpack(extract_dir)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn archive_kind_by_name() {
        assert_eq!(ArchiveKind::from_path(&PathBuf::from("rpcs3.7z")), Some(ArchiveKind::SevenZip));
        assert_eq!(ArchiveKind::from_path(&PathBuf::from("X.ZIP")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::from_path(&PathBuf::from("a.tgz")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::from_path(&PathBuf::from("a.tar.xz")), Some(ArchiveKind::TarXz));
        assert_eq!(ArchiveKind::from_path(&PathBuf::from("a.AppImage")), None);
    }

    #[test]
    fn extracts_zip_over_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("emu.zip");
        write_zip(&archive, &[("emu.exe", b"new"), ("data/readme.txt", b"hi")]);
        fs::write(dir.path().join("emu.exe"), "old").unwrap();

        ArchiveExtractor.extract(&archive, dir.path()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("emu.exe")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dir.path().join("data/readme.txt")).unwrap(), "hi");
    }

    #[test]
    fn skips_entries_escaping_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../escaped.txt", b"x"), ("ok.txt", b"y")]);

        ArchiveExtractor.extract(&archive, &out).unwrap();

        assert!(!dir.path().join("escaped.txt").exists());
        assert!(out.join("ok.txt").exists());
    }

    fn append_entry<W: Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, name, data).unwrap();
    }

    #[test]
    fn extracts_7z() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("rpcs3"), "ps3 build").unwrap();
        let archive = dir.path().join("rpcs3.7z");
        sevenz_rust::compress_to_path(src.join("rpcs3"), &archive).unwrap();

        let out = dir.path().join("out");
        ArchiveExtractor.extract(&archive, &out).unwrap();

        assert_eq!(fs::read_to_string(out.join("rpcs3")).unwrap(), "ps3 build");
    }

    #[test]
    fn corrupt_7z_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("rpcs3.7z");
        fs::write(&archive, "not a 7z").unwrap();
        assert!(ArchiveExtractor.extract(&archive, dir.path()).is_err());
    }

    #[test]
    fn extracts_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("emu.tar.gz");
        let encoder = flate2::write::GzEncoder::new(
            fs::File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(encoder);
        append_entry(&mut builder, "emu", b"gz build");
        append_entry(&mut builder, "lib/core.so", b"core");
        builder.into_inner().unwrap().finish().unwrap();

        let out = dir.path().join("out");
        ArchiveExtractor.extract(&archive, &out).unwrap();

        assert_eq!(fs::read_to_string(out.join("emu")).unwrap(), "gz build");
        assert_eq!(fs::read_to_string(out.join("lib/core.so")).unwrap(), "core");
    }

    #[test]
    fn extracts_tar_xz() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("emu.tar.xz");
        let encoder = xz2::write::XzEncoder::new(fs::File::create(&archive).unwrap(), 6);
        let mut builder = tar::Builder::new(encoder);
        append_entry(&mut builder, "emu", b"xz build");
        builder.into_inner().unwrap().finish().unwrap();

        let out = dir.path().join("out");
        ArchiveExtractor.extract(&archive, &out).unwrap();

        assert_eq!(fs::read_to_string(out.join("emu")).unwrap(), "xz build");
    }

    #[test]
    fn rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("emu.rar");
        fs::write(&archive, "").unwrap();
        assert!(ArchiveExtractor.extract(&archive, dir.path()).is_err());
    }

    #[test]
    fn corrupt_zip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("emu.zip");
        fs::write(&archive, "not a zip").unwrap();
        assert!(ArchiveExtractor.extract(&archive, dir.path()).is_err());
    }
}
