use std::{
    io,
    sync::{Arc, Mutex},
};

use common::color::PixelColor;
use serde::Deserialize;

/// 物理屏幕尺寸，列数为宽，行数为高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SurfaceSize {
    pub columns: usize,
    pub rows: usize,
}

impl SurfaceSize {
    pub const fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as u64) < self.columns as u64 && (y as u64) < self.rows as u64
    }
}

/// 离屏像素缓冲，坐标原点在左上角
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    size: SurfaceSize,
    pixels: Vec<PixelColor>,
}

impl PixelBuffer {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            pixels: vec![PixelColor::BLACK; size.columns * size.rows],
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn fill(&mut self, color: PixelColor) {
        self.pixels.fill(color);
    }

    /// 越界的写入直接丢弃
    pub fn set_pixel(&mut self, x: i64, y: i64, color: PixelColor) {
        if self.size.contains(x, y) {
            let index = y as usize * self.size.columns + x as usize;
            self.pixels[index] = color;
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<PixelColor> {
        if x < self.size.columns && y < self.size.rows {
            Some(self.pixels[y * self.size.columns + x])
        } else {
            None
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[PixelColor]> {
        self.pixels.chunks(self.size.columns.max(1))
    }
}

/// 物理或虚拟的像素输出设备
pub trait DisplaySurface: Send {
    fn size(&self) -> SurfaceSize;

    fn fill(&mut self, color: PixelColor);

    fn set_pixel(&mut self, x: usize, y: usize, color: PixelColor);

    /// 原子地把后台缓冲切换到前台
    fn swap(&mut self) -> io::Result<()>;

    /// 附加的状态文字，不支持的设备忽略
    fn set_status(&mut self, _status: &str) {}
}

/// 内存中的双缓冲设备，用于无头运行和测试
pub struct MemorySurface {
    back: PixelBuffer,
    front: FrontBuffer,
}

/// 可以跨线程读取的前台缓冲
#[derive(Debug, Clone)]
pub struct FrontBuffer {
    inner: Arc<Mutex<FrontState>>,
}

#[derive(Debug)]
struct FrontState {
    pixels: PixelBuffer,
    swaps: u64,
    status: String,
}

impl MemorySurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            back: PixelBuffer::new(size),
            front: FrontBuffer {
                inner: Arc::new(Mutex::new(FrontState {
                    pixels: PixelBuffer::new(size),
                    swaps: 0,
                    status: String::new(),
                })),
            },
        }
    }

    pub fn front(&self) -> FrontBuffer {
        self.front.clone()
    }
}

impl DisplaySurface for MemorySurface {
    fn size(&self) -> SurfaceSize {
        self.back.size()
    }

    fn fill(&mut self, color: PixelColor) {
        self.back.fill(color);
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: PixelColor) {
        self.back.set_pixel(x as i64, y as i64, color);
    }

    fn swap(&mut self) -> io::Result<()> {
        let mut front = self
            .front
            .inner
            .lock()
            .map_err(|_| io::Error::other("前台缓冲锁已损坏"))?;
        std::mem::swap(&mut front.pixels, &mut self.back);
        front.swaps += 1;
        Ok(())
    }

    fn set_status(&mut self, status: &str) {
        if let Ok(mut front) = self.front.inner.lock() {
            front.status = status.to_string();
        }
    }
}

impl FrontBuffer {
    pub fn pixel(&self, x: usize, y: usize) -> Option<PixelColor> {
        self.inner.lock().ok()?.pixels.pixel(x, y)
    }

    pub fn snapshot(&self) -> Option<PixelBuffer> {
        self.inner.lock().ok().map(|front| front.pixels.clone())
    }

    /// 已经完成的切换次数
    pub fn swaps(&self) -> u64 {
        self.inner.lock().map(|front| front.swaps).unwrap_or(0)
    }

    pub fn status(&self) -> String {
        self.inner
            .lock()
            .map(|front| front.status.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_out_of_bounds_write_dropped() {
        let mut buffer = PixelBuffer::new(SurfaceSize::new(4, 2));
        let red = PixelColor::new(255, 0, 0);
        buffer.set_pixel(-1, 0, red);
        buffer.set_pixel(4, 0, red);
        buffer.set_pixel(0, 2, red);
        buffer.set_pixel(3, 1, red);
        assert_eq!(buffer.pixel(3, 1), Some(red));
        assert_eq!(buffer.rows().flatten().filter(|c| **c == red).count(), 1);
        assert_eq!(buffer.pixel(4, 0), None);
    }

    #[test]
    fn test_swap_publishes_back_buffer() {
        let mut surface = MemorySurface::new(SurfaceSize::new(2, 2));
        let front = surface.front();
        let blue = PixelColor::new(0, 0, 255);
        surface.fill(blue);
        // 切换前前台不可见
        assert_eq!(front.pixel(0, 0), Some(PixelColor::BLACK));
        surface.swap().unwrap();
        assert_eq!(front.pixel(1, 1), Some(blue));
        assert_eq!(front.swaps(), 1);
    }
}
