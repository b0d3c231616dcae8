//! The incremental flat-bed plotter (§4.4): a pen that steps over a raster
//! and blackens a square under it while down, flushed to PNG on exit.

use crate::error::EmulatorError;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

const STEP_EAST: u8 = 1 << 0;
const STEP_WEST: u8 = 1 << 1;
const STEP_NORTH: u8 = 1 << 2;
const STEP_SOUTH: u8 = 1 << 3;
const PEN_UP: u8 = 1 << 4;
const PEN_DOWN: u8 = 1 << 5;

pub struct Plotter {
    width: u32,
    height: u32,
    pen_size: u32,
    pen_down: bool,
    x: u32,
    y: u32,
    raster: Vec<u8>,
}

impl Plotter {
    pub fn new(width: u32, height: u32, pen_size: u32) -> Self {
        Plotter {
            width,
            height,
            pen_size,
            pen_down: false,
            x: width / 2,
            y: height / 2,
            raster: vec![0xFF; width as usize * height as usize * 3],
        }
    }

    /// Whether a command is "slow" (pen up/down, 20000us) or a cheap step
    /// (3300us), per §4.4's I/O dispatch table.
    pub fn is_pen_command(bits: u8) -> bool {
        bits & (PEN_UP | PEN_DOWN) != 0
    }

    /// Apply the low 6 bits of A as a plotter command.
    pub fn command(&mut self, bits: u8) {
        if bits & STEP_EAST != 0 {
            self.x = (self.x + 1).min(self.width.saturating_sub(1));
        }
        if bits & STEP_WEST != 0 {
            self.x = self.x.saturating_sub(1);
        }
        if bits & STEP_NORTH != 0 {
            self.y = (self.y + 1).min(self.height.saturating_sub(1));
        }
        if bits & STEP_SOUTH != 0 {
            self.y = self.y.saturating_sub(1);
        }
        if bits & PEN_UP != 0 {
            self.pen_down = false;
        }
        if bits & PEN_DOWN != 0 {
            self.pen_down = true;
        }
        if self.pen_down {
            self.blacken_square();
        }
    }

    fn blacken_square(&mut self) {
        let half = self.pen_size;
        let x0 = self.x.saturating_sub(half);
        let y0 = self.y.saturating_sub(half);
        let x1 = (self.x + half).min(self.width.saturating_sub(1));
        let y1 = (self.y + half).min(self.height.saturating_sub(1));

        for y in y0..=y1 {
            for x in x0..=x1 {
                let offset = (y as usize * self.width as usize + x as usize) * 3;
                self.raster[offset] = 0;
                self.raster[offset + 1] = 0;
                self.raster[offset + 2] = 0;
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), EmulatorError> {
        let file = File::create(path).map_err(|source| EmulatorError::Peripheral {
            path: path.to_path_buf(),
            source,
        })?;
        let writer = BufWriter::new(file);
        let mut encoder = png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| EmulatorError::Peripheral {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?;
        writer
            .write_image_data(&self.raster)
            .map_err(|e| EmulatorError::Peripheral {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })
    }
}
