use anyhow::{bail, Result};
use display_core::{Point, Rect, Renderer, Size};

/// CPU framebuffer: fills damaged regions with a frame-dependent shade.
pub struct BufferRenderer {
    size: Size,
    viewport: Rect,
    pixels: Vec<u32>,
    damage: Vec<Rect>,
    frame: u32,
}

impl BufferRenderer {
    pub fn new() -> Self {
        Self {
            size: Size::default(),
            viewport: Rect::default(),
            pixels: Vec::new(),
            damage: Vec::new(),
            frame: 0,
        }
    }

    fn fill(&mut self, rect: Rect, color: u32) {
        let width = self.size.width as i32;
        for y in rect.y..rect.y + rect.height as i32 {
            let row = (y * width) as usize;
            let start = row + rect.x as usize;
            let end = start + rect.width as usize;
            self.pixels[start..end].fill(color);
        }
    }
}

impl Renderer for BufferRenderer {
    fn output_size(&self) -> Size {
        self.size
    }

    fn set_output_size(&mut self, size: Size) {
        self.size = size;
        self.pixels = vec![0; size.area() as usize];
    }

    fn set_viewport(&mut self, origin: Point, size: Size) {
        self.viewport = Rect::from_parts(origin, size);
    }

    fn add_damage(&mut self, rect: Rect) {
        self.damage.push(rect);
    }

    fn render(&mut self) -> Result<Vec<Rect>> {
        if self.pixels.is_empty() {
            bail!("render surface has no pixels");
        }

        let bounds = Rect::from_parts(Point::ORIGIN, self.size);
        let clip = match self.viewport.intersect(&bounds) {
            Some(clip) => clip,
            None => return Ok(Vec::new()),
        };

        self.frame = self.frame.wrapping_add(1);
        let shade = 0xff00_0000 | (self.frame.wrapping_mul(0x0001_0203) & 0x00ff_ffff);

        let damage = std::mem::take(&mut self.damage);
        let mut drawn = Vec::with_capacity(damage.len());
        for rect in damage {
            if let Some(r) = rect.intersect(&clip) {
                self.fill(r, shade);
                drawn.push(r);
            }
        }
        Ok(drawn)
    }
}
