use std::io::{self, BufWriter, Stdout, Write};

use common::color::PixelColor;
use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::surface::{DisplaySurface, PixelBuffer, SurfaceSize};

/// 每个像素占用的终端列数，两列接近正方形
const CELL_WIDTH: u16 = 2;

/// 在终端里用背景色方块模拟点阵屏
///
/// `swap` 时只重绘与上一帧不同的像素，所有指令批量写入后一次性 flush
pub struct TerminalSurface {
    writer: BufWriter<Stdout>,
    back: PixelBuffer,
    /// 终端上当前显示的内容，None 表示需要整屏重绘
    shown: Option<PixelBuffer>,
    status: String,
}

impl TerminalSurface {
    pub fn new(size: SurfaceSize) -> io::Result<Self> {
        let mut writer = BufWriter::new(io::stdout());
        execute!(writer, cursor::Hide, Clear(ClearType::All))?;
        Ok(Self {
            writer,
            back: PixelBuffer::new(size),
            shown: None,
            status: String::new(),
        })
    }

    fn draw(&mut self) -> io::Result<()> {
        for (y, row) in self.back.rows().enumerate() {
            for (x, color) in row.iter().enumerate() {
                let unchanged = self
                    .shown
                    .as_ref()
                    .and_then(|shown| shown.pixel(x, y))
                    .is_some_and(|prev| prev == *color);
                if unchanged {
                    continue;
                }
                queue!(
                    self.writer,
                    MoveTo(x as u16 * CELL_WIDTH, y as u16),
                    SetBackgroundColor(to_terminal_color(*color)),
                    Print("  ")
                )?;
            }
        }
        queue!(
            self.writer,
            ResetColor,
            MoveTo(0, self.back.size().rows as u16),
            terminal::Clear(ClearType::CurrentLine),
            Print(&self.status)
        )?;
        self.writer.flush()
    }
}

impl DisplaySurface for TerminalSurface {
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
        self.draw()?;
        self.shown = Some(self.back.clone());
        Ok(())
    }

    fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        let _ = execute!(self.writer, ResetColor, cursor::Show);
    }
}

fn to_terminal_color(color: PixelColor) -> Color {
    Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}
