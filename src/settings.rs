use crate::surface::RasterOp;

/// How the target surface is copied into the session bitmap.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub enum RasterMode {
    /// Direct copy of the surface pixels.
    #[default]
    Copy,
    /// Direct copy that also includes layered windows drawn over the surface.
    CopyWithLayered,
}

impl From<RasterMode> for RasterOp {
    #[inline]
    fn from(value: RasterMode) -> Self {
        match value {
            RasterMode::Copy => Self::SourceCopy,
            RasterMode::CopyWithLayered => Self::SourceCopyWithLayered,
        }
    }
}

/// Capture session settings.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Default)]
pub struct CaptureSettings {
    pub raster_mode: RasterMode,
    /// Convert rows on the rayon thread pool instead of the calling thread.
    pub parallel_conversion: bool,
}

impl CaptureSettings {
    /// Create capture settings.
    #[inline]
    #[must_use]
    pub const fn new(raster_mode: RasterMode, parallel_conversion: bool) -> Self {
        Self { raster_mode, parallel_conversion }
    }

    /// Returns these settings with a different raster mode.
    #[inline]
    #[must_use]
    pub const fn with_raster_mode(mut self, raster_mode: RasterMode) -> Self {
        self.raster_mode = raster_mode;
        self
    }

    /// Returns these settings with parallel conversion turned on or off.
    #[inline]
    #[must_use]
    pub const fn with_parallel_conversion(mut self, parallel_conversion: bool) -> Self {
        self.parallel_conversion = parallel_conversion;
        self
    }
}
