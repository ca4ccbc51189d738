//! Texture loading and lifetime.
//!
//! Textures live until the manager is dropped. Each one takes a slot in the
//! shader-visible SRV heap, and slots are never reused.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    backend::{Backend, TextureDesc},
    DescriptorIndex, Error, GpuDescriptor, Graphics, PixelBuffer, PixelFormat, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureMetadata {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: PixelFormat,
}

struct Entry<B: Backend> {
    // Never read, but must stay alive as long as its view can be bound.
    _texture: B::Texture,
    metadata: TextureMetadata,
    srv: DescriptorIndex,
    gpu_handle: GpuDescriptor,
}

pub struct TextureManager<B: Backend> {
    textures: Vec<Entry<B>>,
    by_path: HashMap<PathBuf, TextureId>,
    /// Upload buffers still referenced by recorded copies, tagged with the
    /// frame count at the time of recording. The copy is done once a frame
    /// has ended after it.
    pending: Vec<(u64, B::Buffer)>,
}

impl<B: Backend> Default for TextureManager<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> TextureManager<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            textures: Vec::new(),
            by_path: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Loads a PNG file, builds its mip chain and records the upload into
    /// the open command list. The copy executes with the next frame.
    ///
    /// Loading a path that is already loaded returns the existing texture.
    /// Paths are compared as given, without resolving them.
    pub fn load(&mut self, graphics: &mut Graphics<B>, path: impl AsRef<Path>) -> Result<TextureId> {
        let path = path.as_ref();
        if let Some(&id) = self.by_path.get(path) {
            debug!("texture {} already loaded as {id:?}", path.display());
            return Ok(id);
        }

        // Check before decoding, which is the slow part.
        graphics.srv_allocator().ensure_available()?;

        let pixels = PixelBuffer::load_png(path)?;
        let id = self.upload(graphics, &pixels)?;
        self.by_path.insert(path.to_owned(), id);

        info!(
            "loaded texture {} as {id:?} ({}x{})",
            path.display(),
            pixels.width(),
            pixels.height()
        );
        Ok(id)
    }

    /// Uploads an image decoded elsewhere. `key` plays the role of the path
    /// in [`TextureManager::load`]: a repeated key returns the texture
    /// loaded first.
    pub fn load_pixels(
        &mut self,
        graphics: &mut Graphics<B>,
        key: impl AsRef<Path>,
        pixels: &PixelBuffer,
    ) -> Result<TextureId> {
        let key = key.as_ref();
        if let Some(&id) = self.by_path.get(key) {
            return Ok(id);
        }

        graphics.srv_allocator().ensure_available()?;
        let id = self.upload(graphics, pixels)?;
        self.by_path.insert(key.to_owned(), id);
        Ok(id)
    }

    fn upload(&mut self, graphics: &mut Graphics<B>, pixels: &PixelBuffer) -> Result<TextureId> {
        let mips = pixels.mip_chain();
        #[allow(clippy::cast_possible_truncation)]
        let desc = TextureDesc {
            width: pixels.width(),
            height: pixels.height(),
            mip_levels: mips.len() as u32,
            format: pixels.format(),
        };

        let texture = graphics.backend_mut().create_texture(&desc)?;
        let intermediate = graphics.backend_mut().upload_texture(&texture, &mips)?;
        self.pending.push((graphics.frame_count(), intermediate));

        let srv = graphics.srv_allocator_mut().allocate()?;
        let layout = *graphics.srv_allocator().layout();
        graphics
            .backend_mut()
            .create_texture_view(&texture, &desc, layout.cpu(srv));

        #[allow(clippy::cast_possible_truncation)]
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(Entry {
            _texture: texture,
            metadata: TextureMetadata {
                width: desc.width,
                height: desc.height,
                mip_levels: desc.mip_levels,
                format: desc.format,
            },
            srv,
            gpu_handle: layout.gpu(srv),
        });

        Ok(id)
    }

    fn entry(&self, id: TextureId) -> Result<&Entry<B>> {
        self.textures
            .get(id.0 as usize)
            .ok_or(Error::UnknownTexture(id.0))
    }

    /// The descriptor to bind as a texture table.
    pub fn gpu_handle(&self, id: TextureId) -> Result<GpuDescriptor> {
        Ok(self.entry(id)?.gpu_handle)
    }

    pub fn srv_index(&self, id: TextureId) -> Result<DescriptorIndex> {
        Ok(self.entry(id)?.srv)
    }

    pub fn metadata(&self, id: TextureId) -> Result<TextureMetadata> {
        Ok(self.entry(id)?.metadata)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    #[must_use]
    pub fn pending_uploads(&self) -> usize {
        self.pending.len()
    }

    /// Frees upload buffers whose copies the GPU has finished. Returns how
    /// many were freed.
    pub fn release_intermediates(&mut self, graphics: &Graphics<B>) -> usize {
        let frame_count = graphics.frame_count();
        let before = self.pending.len();
        self.pending.retain(|(recorded, _)| *recorded >= frame_count);

        let released = before - self.pending.len();
        if released > 0 {
            debug!("released {released} texture upload buffers");
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::BufWriter};

    use super::*;
    use crate::{
        backend::headless::{self, Command, Headless},
        Color, ColorSpace, GraphicsConfig,
    };

    fn graphics(max_srv_count: u32) -> Graphics<Headless> {
        let config = GraphicsConfig {
            max_srv_count,
            ..GraphicsConfig::default()
        };
        Graphics::new(&config, &headless::surface(64, 64)).unwrap()
    }

    fn checker(width: u32) -> PixelBuffer {
        let colors: Vec<_> = (0..width * width)
            .map(|i| if i % 2 == 0 { Color::WHITE } else { Color::BLACK })
            .collect();
        PixelBuffer::from_colors(&colors, width, PixelFormat::Rgba8, ColorSpace::Srgb)
    }

    fn write_png(path: &Path) {
        let file = File::create(path).unwrap();
        let mut encoder = png::Encoder::new(BufWriter::new(file), 4, 4);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&[200; 4 * 4 * 4]).unwrap();
    }

    #[test]
    fn same_path_loads_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uvChecker.png");
        write_png(&path);

        let mut graphics = graphics(16);
        let mut textures = TextureManager::new();

        let first = textures.load(&mut graphics, &path).unwrap();
        let used = graphics.srv_allocator().used();
        let second = textures.load(&mut graphics, &path).unwrap();

        assert_eq!(first, second);
        assert_eq!(graphics.srv_allocator().used(), used);
        assert_eq!(textures.len(), 1);

        // Slot 0 is reserved.
        assert_eq!(textures.srv_index(first).unwrap(), DescriptorIndex(1));
        assert_eq!(
            textures.metadata(first).unwrap(),
            TextureMetadata {
                width: 4,
                height: 4,
                mip_levels: 3,
                format: PixelFormat::Rgba8,
            }
        );
    }

    #[test]
    fn exhaustion_is_reported_before_upload() {
        // One reserved slot and two usable ones.
        let mut graphics = graphics(3);
        let mut textures = TextureManager::new();

        textures.load_pixels(&mut graphics, "a", &checker(2)).unwrap();
        textures.load_pixels(&mut graphics, "b", &checker(2)).unwrap();
        let uploads = graphics.backend().commands().len();

        // Already loaded keys still resolve.
        assert_eq!(
            textures.load_pixels(&mut graphics, "a", &checker(2)).unwrap(),
            TextureId(0)
        );

        for key in ["c", "d"] {
            assert!(matches!(
                textures.load_pixels(&mut graphics, key, &checker(2)),
                Err(Error::DescriptorHeapExhausted {
                    used: 3,
                    capacity: 3
                })
            ));
        }
        assert_eq!(textures.len(), 2);
        assert_eq!(graphics.backend().commands().len(), uploads);
    }

    #[test]
    fn intermediates_outlive_the_copy() {
        let mut graphics = graphics(16);
        let mut textures = TextureManager::new();

        let id = textures.load_pixels(&mut graphics, "checker", &checker(8)).unwrap();
        assert!(graphics
            .backend()
            .commands()
            .contains(&Command::UploadTexture {
                texture: 0,
                mip_levels: 4
            }));

        assert_eq!(textures.release_intermediates(&graphics), 0);
        assert_eq!(textures.pending_uploads(), 1);

        // Draining the queue does not submit the copy.
        graphics.wait_gpu().unwrap();
        assert_eq!(textures.release_intermediates(&graphics), 0);

        graphics.begin_frame().unwrap().end().unwrap();
        assert_eq!(textures.release_intermediates(&graphics), 1);
        assert_eq!(textures.pending_uploads(), 0);

        // The texture itself stays usable.
        let layout = *graphics.srv_allocator().layout();
        assert_eq!(
            textures.gpu_handle(id).unwrap(),
            layout.gpu(DescriptorIndex(1))
        );
    }

    #[test]
    fn failures_do_not_consume_slots() {
        let mut graphics = graphics(16);
        let mut textures = TextureManager::new();

        assert!(matches!(
            textures.load(&mut graphics, "no/such/texture.png"),
            Err(Error::Io { .. })
        ));
        assert_eq!(graphics.srv_allocator().used(), 1);

        assert!(matches!(
            textures.gpu_handle(TextureId(7)),
            Err(Error::UnknownTexture(7))
        ));
    }
}
