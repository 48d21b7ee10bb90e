use std::collections::HashMap;

use egui::{ColorImage, Context, TextureHandle, TextureId, TextureOptions};
use image::RgbaImage;
use thiserror::Error;

/// Errors that can occur during texture generation
#[derive(Error, Debug)]
pub enum TextureGenerationError {
    #[error("Invalid texture dimensions: {0}x{1}")]
    InvalidDimensions(u32, u32),
}

/// Converts a straight-alpha raster into an egui image.
pub fn to_color_image(image: &RgbaImage) -> Result<ColorImage, TextureGenerationError> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(TextureGenerationError::InvalidDimensions(w, h));
    }
    Ok(ColorImage::from_rgba_unmultiplied(
        [w as usize, h as usize],
        image.as_raw(),
    ))
}

/// Uploads render planes to the GPU, caching one texture per
/// (slot, version). Uploading a new version of a slot releases the older
/// ones, since a plane only ever shows its latest content.
pub struct TextureManager {
    texture_cache: HashMap<(usize, u64), TextureHandle>,
    /// Frame in which each texture was last used
    last_used: HashMap<(usize, u64), u64>,
    current_frame: u64,
    max_cache_size: usize,
}

impl TextureManager {
    pub fn new(max_cache_size: usize) -> Self {
        Self {
            texture_cache: HashMap::new(),
            last_used: HashMap::new(),
            current_frame: 0,
            max_cache_size: max_cache_size.max(1),
        }
    }

    /// Increments the frame counter, should be called at the start of each frame
    pub fn begin_frame(&mut self) {
        self.current_frame += 1;
    }

    /// Gets or uploads the texture for `slot` at `version`.
    pub fn get_or_create_texture<F>(
        &mut self,
        slot: usize,
        version: u64,
        generator: F,
        ctx: &Context,
    ) -> Result<TextureId, TextureGenerationError>
    where
        F: FnOnce() -> Result<ColorImage, TextureGenerationError>,
    {
        let cache_key = (slot, version);

        if let Some(handle) = self.texture_cache.get(&cache_key) {
            self.last_used.insert(cache_key, self.current_frame);
            return Ok(handle.id());
        }

        let image = generator()?;
        self.invalidate_slot(slot);
        self.make_room();

        let name = format!("plane_{slot}_v{version}");
        log::debug!("Uploading texture {name} ({}x{})", image.size[0], image.size[1]);
        let handle = ctx.load_texture(&name, image, TextureOptions::LINEAR);
        let id = handle.id();

        self.texture_cache.insert(cache_key, handle);
        self.last_used.insert(cache_key, self.current_frame);
        Ok(id)
    }

    /// Drops every cached version of `slot`.
    pub fn invalidate_slot(&mut self, slot: usize) {
        self.texture_cache.retain(|(s, _), _| *s != slot);
        self.last_used.retain(|(s, _), _| *s != slot);
    }

    /// Evicts least recently used textures until one more fits.
    fn make_room(&mut self) {
        if self.texture_cache.len() < self.max_cache_size {
            return;
        }

        let mut entries: Vec<((usize, u64), u64)> = self.last_used.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by_key(|(_, frame)| *frame);

        let to_remove = self.texture_cache.len() + 1 - self.max_cache_size;
        for (key, _) in entries.iter().take(to_remove) {
            self.texture_cache.remove(key);
            self.last_used.remove(key);
        }
    }

    pub fn clear_cache(&mut self) {
        self.texture_cache.clear();
        self.last_used.clear();
    }

    /// Returns the number of textures currently in the cache
    pub fn cache_size(&self) -> usize {
        self.texture_cache.len()
    }

    #[cfg(test)]
    pub fn get_texture(&self, slot: usize, version: u64) -> Option<&TextureHandle> {
        self.texture_cache.get(&(slot, version))
    }
}

impl std::fmt::Debug for TextureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureManager")
            .field("cached", &self.texture_cache.len())
            .field("frame", &self.current_frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn mock_texture_generator() -> Result<ColorImage, TextureGenerationError> {
        to_color_image(&RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn test_cache_hit() {
        let ctx = Context::default();
        let mut manager = TextureManager::new(10);

        let texture_id1 = manager.get_or_create_texture(1, 1, mock_texture_generator, &ctx).unwrap();
        let texture_id2 = manager.get_or_create_texture(1, 1, mock_texture_generator, &ctx).unwrap();

        assert_eq!(texture_id1, texture_id2);
        assert_eq!(manager.cache_size(), 1);
    }

    #[test]
    fn test_invalidation() {
        let ctx = Context::default();
        let mut manager = TextureManager::new(10);
        manager.get_or_create_texture(1, 1, mock_texture_generator, &ctx).unwrap();
        assert_eq!(manager.cache_size(), 1);

        manager.invalidate_slot(1);
        assert_eq!(manager.cache_size(), 0);
    }

    #[test]
    fn test_lru_eviction() {
        let ctx = Context::default();
        let mut manager = TextureManager::new(2);

        manager.get_or_create_texture(1, 1, mock_texture_generator, &ctx).unwrap();
        manager.begin_frame();
        manager.get_or_create_texture(2, 1, mock_texture_generator, &ctx).unwrap();
        manager.begin_frame();
        manager.get_or_create_texture(3, 1, mock_texture_generator, &ctx).unwrap();

        assert_eq!(manager.cache_size(), 2);
        assert!(manager.get_texture(1, 1).is_none());
        assert!(manager.get_texture(2, 1).is_some());
        assert!(manager.get_texture(3, 1).is_some());
    }

    #[test]
    fn test_new_version_replaces_old() {
        let ctx = Context::default();
        let mut manager = TextureManager::new(10);

        manager.get_or_create_texture(1, 1, mock_texture_generator, &ctx).unwrap();
        manager.get_or_create_texture(1, 2, mock_texture_generator, &ctx).unwrap();

        assert_eq!(manager.cache_size(), 1);
        assert!(manager.get_texture(1, 1).is_none());
        assert!(manager.get_texture(1, 2).is_some());
    }

    #[test]
    fn test_empty_image_is_rejected() {
        assert!(matches!(
            to_color_image(&RgbaImage::new(0, 4)),
            Err(TextureGenerationError::InvalidDimensions(0, 4))
        ));
    }
}
