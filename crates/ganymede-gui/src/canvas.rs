use std::collections::HashMap;

use egui::epaint::{Mesh, Vertex};
use ganymede_core::geometry::{PointF, RectF};
use ganymede_core::pixels::PixelBuffer;
use ganymede_core::render::{Canvas, ViewTransform};

struct CachedTexture {
    handle: egui::TextureHandle,
    used: bool,
}

/// GPU copies of decoded buffers, keyed by buffer id.
///
/// Buffers the viewer stopped drawing are dropped at the end of the frame,
/// which frees the texture once egui lets go of it.
#[derive(Default)]
pub struct TextureCache {
    textures: HashMap<u64, CachedTexture>,
}

impl TextureCache {
    fn get_or_upload(&mut self, ctx: &egui::Context, pixels: &PixelBuffer) -> egui::TextureId {
        let entry = self.textures.entry(pixels.id()).or_insert_with(|| {
            let image = egui::ColorImage::from_rgba_unmultiplied(
                [pixels.width() as usize, pixels.height() as usize],
                pixels.image().as_raw(),
            );
            let handle = ctx.load_texture(
                format!("tile-{}", pixels.id()),
                image,
                egui::TextureOptions::LINEAR,
            );
            CachedTexture {
                handle,
                used: false,
            }
        });
        entry.used = true;
        entry.handle.id()
    }

    /// Drop textures not drawn since the last prune.
    pub fn prune(&mut self) -> usize {
        let before = self.textures.len();
        self.textures.retain(|_, t| std::mem::take(&mut t.used));
        before - self.textures.len()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }
}

/// Draws viewer output with textured meshes inside a panel rect.
pub struct EguiCanvas<'a> {
    ctx: &'a egui::Context,
    painter: &'a egui::Painter,
    origin: egui::Pos2,
    transform: ViewTransform,
    textures: &'a mut TextureCache,
}

impl<'a> EguiCanvas<'a> {
    pub fn new(
        ctx: &'a egui::Context,
        painter: &'a egui::Painter,
        rect: egui::Rect,
        textures: &'a mut TextureCache,
    ) -> Self {
        Self {
            ctx,
            painter,
            origin: rect.min,
            transform: ViewTransform::new(Default::default(), rect.width(), rect.height()),
            textures,
        }
    }

    fn to_screen(&self, x: f32, y: f32) -> egui::Pos2 {
        let p = self.transform.map_point(PointF::new(x, y));
        self.origin + egui::vec2(p.x, p.y)
    }
}

impl Canvas for EguiCanvas<'_> {
    fn set_transform(&mut self, transform: ViewTransform) {
        self.transform = transform;
    }

    fn draw_pixels(&mut self, pixels: &PixelBuffer, src: RectF, dst: RectF) {
        if pixels.width() == 0 || pixels.height() == 0 || dst.is_empty() {
            return;
        }
        let texture = self.textures.get_or_upload(self.ctx, pixels);
        let (w, h) = (pixels.width() as f32, pixels.height() as f32);
        let (u0, v0, u1, v1) = (src.left / w, src.top / h, src.right / w, src.bottom / h);

        // Corners are mapped one by one, so rotated views keep their UVs.
        let corners = [
            (dst.left, dst.top, u0, v0),
            (dst.right, dst.top, u1, v0),
            (dst.right, dst.bottom, u1, v1),
            (dst.left, dst.bottom, u0, v1),
        ];
        let mut mesh = Mesh::with_texture(texture);
        for (x, y, u, v) in corners {
            mesh.vertices.push(Vertex {
                pos: self.to_screen(x, y),
                uv: egui::pos2(u, v),
                color: egui::Color32::WHITE,
            });
        }
        mesh.add_triangle(0, 1, 2);
        mesh.add_triangle(0, 2, 3);
        self.painter.add(egui::Shape::mesh(mesh));
    }
}
