//! Telescope mount collaborator.
//!
//! While an exposure runs the capture worker asks the mount to buffer its
//! pointing samples; afterwards it takes the middle sample and the observatory
//! location and attaches them to the image.

use anyhow::Result;
use async_trait::async_trait;

use crate::image::{ObservatoryLocation, Pointing};

/// Source of pointing information for captured images.
#[async_trait]
pub trait MountClient: Send + Sync {
    /// Start recording pointing samples.
    async fn start_buffering(&self) -> Result<()>;

    /// Stop recording pointing samples.
    async fn stop_buffering(&self) -> Result<()>;

    /// Samples recorded between the last start and stop, oldest first.
    async fn coordinates(&self) -> Result<Vec<Pointing>>;

    /// Observatory location, if the mount knows it.
    async fn location(&self) -> Result<Option<ObservatoryLocation>>;
}

/// Mount client for runs without a telescope. Reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMount;

#[async_trait]
impl MountClient for NoMount {
    async fn start_buffering(&self) -> Result<()> {
        Ok(())
    }

    async fn stop_buffering(&self) -> Result<()> {
        Ok(())
    }

    async fn coordinates(&self) -> Result<Vec<Pointing>> {
        Ok(Vec::new())
    }

    async fn location(&self) -> Result<Option<ObservatoryLocation>> {
        Ok(None)
    }
}

/// Middle sample of a buffered run.
pub fn midpoint(samples: &[Pointing]) -> Option<Pointing> {
    samples.get(samples.len() / 2).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(&[]), None);
        let samples: Vec<Pointing> = (0..5)
            .map(|i| Pointing::Equatorial {
                ra: f64::from(i),
                dec: 0.0,
            })
            .collect();
        assert_eq!(
            midpoint(&samples),
            Some(Pointing::Equatorial { ra: 2.0, dec: 0.0 })
        );
    }

    #[test]
    fn test_no_mount_reports_nothing() {
        let mount = NoMount;
        tokio_test::block_on(async {
            tokio_test::assert_ok!(mount.start_buffering().await);
            tokio_test::assert_ok!(mount.stop_buffering().await);
            assert!(tokio_test::assert_ok!(mount.coordinates().await).is_empty());
            assert!(tokio_test::assert_ok!(mount.location().await).is_none());
        });
    }
}
