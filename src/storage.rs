//! Image persistence.
//!
//! [`RawFrameWriter`] stores each image as two files in one directory:
//!
//! - `<name>.raw`: pixels as little-endian `u16`, row-major
//! - `<name>.json`: every other field of [`Image`]

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::SbigResult;
use crate::image::Image;

/// Destination for captured images.
#[async_trait]
pub trait ImageSink: Send + Sync {
    /// Store `image` under `name` (no extension). Returns where it went.
    async fn save(&self, image: &Image, name: &str) -> SbigResult<PathBuf>;
}

/// Raw pixel dump plus JSON sidecar.
#[derive(Debug, Clone)]
pub struct RawFrameWriter {
    directory: PathBuf,
}

impl RawFrameWriter {
    /// Write into `directory`, creating it on first save.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Target directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn write_files(&self, image: &Image, name: &str) -> SbigResult<PathBuf> {
        fs::create_dir_all(&self.directory)?;

        let raw_path = self.directory.join(format!("{}.raw", name));
        let mut raw = BufWriter::new(File::create(&raw_path)?);
        for pixel in &image.pixels {
            raw.write_all(&pixel.to_le_bytes())?;
        }
        raw.flush()?;

        let meta_path = self.directory.join(format!("{}.json", name));
        let meta = BufWriter::new(File::create(&meta_path)?);
        serde_json::to_writer_pretty(meta, image)?;

        info!(
            "Saved {}x{} frame to '{}'",
            image.width,
            image.height,
            raw_path.display()
        );
        Ok(raw_path)
    }
}

#[async_trait]
impl ImageSink for RawFrameWriter {
    async fn save(&self, image: &Image, name: &str) -> SbigResult<PathBuf> {
        let writer = self.clone();
        let image = image.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || writer.write_files(&image, &name)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_pixels_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RawFrameWriter::new(dir.path().join("frames"));

        let mut image = Image::new(2, 2);
        image.pixels = vec![1, 2, 0x0300, 0xFFFF];
        image.object = "M42".to_string();

        let path = writer.save(&image, "M42_test").await.unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes, vec![1, 0, 2, 0, 0x00, 0x03, 0xFF, 0xFF]);

        let meta: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("frames/M42_test.json")).unwrap())
                .unwrap();
        assert_eq!(meta["object"], "M42");
        assert_eq!(meta["width"], 2);
        assert!(meta.get("pixels").is_none());
    }

    #[test]
    fn test_write_failure_surfaces_from_blocking_task() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let writer = RawFrameWriter::new(&blocker);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .build()
            .unwrap();
        let result = runtime.block_on(writer.save(&Image::new(1, 1), "frame"));
        assert!(matches!(result, Err(crate::error::SbigError::Io(_))));
        assert!(!blocker.join("frame.raw").exists());
    }
}
