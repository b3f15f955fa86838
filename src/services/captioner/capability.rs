use crate::error::CaptionError;
use crate::models::caption_types::InstructionProfile;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

/// A vision-language model seen from the pipeline: one image plus an
/// instruction profile in, caption text out.
pub trait Captioner: Send + Sync {
    /// Probe the backend before any work starts. Backends that cannot
    /// tell in advance report success and fail on the first call instead.
    fn check_available(&self) -> impl Future<Output = Result<(), CaptionError>> + Send {
        async { Ok(()) }
    }

    fn caption(
        &self,
        image: &Path,
        profile: InstructionProfile,
    ) -> impl Future<Output = Result<String, CaptionError>> + Send;
}

impl<C: Captioner> Captioner for Arc<C> {
    fn check_available(&self) -> impl Future<Output = Result<(), CaptionError>> + Send {
        (**self).check_available()
    }

    fn caption(
        &self,
        image: &Path,
        profile: InstructionProfile,
    ) -> impl Future<Output = Result<String, CaptionError>> + Send {
        (**self).caption(image, profile)
    }
}
