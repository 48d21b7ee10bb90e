use futures::future::{self, BoxFuture, FutureExt};
use image::RgbaImage;

use crate::error::GenerationError;
use crate::request::RegionRequest;

/// The external regeneration service.
///
/// Implementations perform the actual (usually remote) image edit. The
/// returned future must not borrow from `self` so it can be driven off the
/// UI thread.
pub trait Regenerator: Send + Sync {
    fn generate_edit(&self, request: RegionRequest) -> BoxFuture<'static, Result<RgbaImage, GenerationError>>;
}

/// Offline stand-in that hands the prepared region straight back. Useful for
/// trying the staging workflow without a network service.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRegenerator;

impl Regenerator for PassthroughRegenerator {
    fn generate_edit(&self, request: RegionRequest) -> BoxFuture<'static, Result<RgbaImage, GenerationError>> {
        log::info!("Passthrough regeneration for {:?} request", request.mode);
        future::ready(Ok(request.image)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SelectionBox;
    use crate::request::RequestMode;

    #[test]
    fn test_passthrough_returns_payload() {
        let request = RegionRequest {
            mode: RequestMode::Region,
            image: RgbaImage::new(3, 2),
            mask: None,
            prompt: "p".into(),
            reference_images: Vec::new(),
            region: SelectionBox::new(0.0, 0.0, 3.0, 2.0),
        };
        let result = futures::executor::block_on(PassthroughRegenerator.generate_edit(request));
        assert_eq!(result.unwrap().dimensions(), (3, 2));
    }
}
