//! Boundary to the local capture pipeline
//!
//! Device capture and encoding live outside the session core. The session only
//! tells the pipeline what to capture and when to let go of the devices.

use async_trait::async_trait;

use crate::Result;

#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Open the camera and microphone; failure is fatal to joining
    async fn acquire(&self) -> Result<()>;

    /// Start screen capture, optionally with system audio
    async fn start_screen(&self, with_audio: bool) -> Result<()>;

    fn stop_screen(&self);

    /// Mirror the local enable flags onto the capture tracks
    fn set_enabled(&self, video: bool, audio: bool);

    /// Stop every capture and release the devices
    fn release(&self);
}

/// Capture that owns no devices; outbound tracks stay silent
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCapture;

#[async_trait]
impl MediaCapture for NullCapture {
    async fn acquire(&self) -> Result<()> {
        tracing::info!("No capture devices configured, sending silent tracks");
        Ok(())
    }

    async fn start_screen(&self, with_audio: bool) -> Result<()> {
        tracing::debug!("Screen capture requested (audio: {}), nothing to capture", with_audio);
        Ok(())
    }

    fn stop_screen(&self) {}

    fn set_enabled(&self, video: bool, audio: bool) {
        tracing::debug!("Capture enabled flags: video={} audio={}", video, audio);
    }

    fn release(&self) {}
}
