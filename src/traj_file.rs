//! Single-axis trajectory files read by the gimbal firmware from the SD card.
//!
//! Layout (little-endian): a 32 byte header followed by `total_samples`
//! fixed point angles, `i32` = degrees * `angle_scale`. Legacy files with
//! `axis_count == 3` store interleaved frames of three `i32`.

use std::io::{Read, Write};
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};

pub const MAGIC: u32 = 0x4C42_4D47; // "GMBL"
pub const VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 32;
pub const DEFAULT_ANGLE_SCALE: u32 = 1_000_000;
pub const FLAG_POSITIONS: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum TrajFileError {
    #[error("file too small for header")]
    ShortHeader,

    #[error("bad magic: 0x{0:08X} (expected 0x4C424D47)")]
    BadMagic(u32),

    #[error("unsupported version {0}")]
    Version(u8),

    #[error("unsupported axis count {0}")]
    AxisCount(u8),

    #[error("header field {0} must not be zero")]
    Zero(&'static str),

    #[error("expected {expected} samples, file has {got}")]
    Truncated { expected: u64, got: u64 },

    #[error("axis index {index} out of range for {axis_count} axis file")]
    AxisIndex { index: usize, axis_count: u8 },

    #[error("angle {0} deg does not fit the fixed point range")]
    Overflow(f64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrajHeader {
    pub magic: u32,
    pub version: u8,
    pub axis_count: u8,
    pub reserved: u16,
    pub sample_dt_us: u32,
    pub total_samples: u64,
    pub angle_scale: u32,
    pub flags: u32,
    pub header_crc32: u32,
}

impl TrajHeader {
    pub fn single_axis(sample_dt_us: u32, total_samples: u64, angle_scale: u32) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            axis_count: 1,
            reserved: 0,
            sample_dt_us,
            total_samples,
            angle_scale,
            flags: FLAG_POSITIONS,
            header_crc32: 0,
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.magic);
        buf.put_u8(self.version);
        buf.put_u8(self.axis_count);
        buf.put_u16_le(self.reserved);
        buf.put_u32_le(self.sample_dt_us);
        buf.put_u64_le(self.total_samples);
        buf.put_u32_le(self.angle_scale);
        buf.put_u32_le(self.flags);
        buf.put_u32_le(self.header_crc32);
    }

    /// Decode and validate, the same checks the firmware does before playing
    pub fn decode(mut buf: impl Buf) -> Result<Self, TrajFileError> {
        if buf.remaining() < HEADER_SIZE {
            return Err(TrajFileError::ShortHeader);
        }

        let header = Self {
            magic: buf.get_u32_le(),
            version: buf.get_u8(),
            axis_count: buf.get_u8(),
            reserved: buf.get_u16_le(),
            sample_dt_us: buf.get_u32_le(),
            total_samples: buf.get_u64_le(),
            angle_scale: buf.get_u32_le(),
            flags: buf.get_u32_le(),
            header_crc32: buf.get_u32_le(),
        };

        if header.magic != MAGIC {
            return Err(TrajFileError::BadMagic(header.magic));
        }
        if header.version != VERSION {
            return Err(TrajFileError::Version(header.version));
        }
        if !matches!(header.axis_count, 1 | 3) {
            return Err(TrajFileError::AxisCount(header.axis_count));
        }
        if header.sample_dt_us == 0 {
            return Err(TrajFileError::Zero("sample_dt_us"));
        }
        if header.total_samples == 0 {
            return Err(TrajFileError::Zero("total_samples"));
        }
        if header.angle_scale == 0 {
            return Err(TrajFileError::Zero("angle_scale"));
        }

        Ok(header)
    }

    pub fn rate_hz(&self) -> f64 {
        1e6 / self.sample_dt_us as f64
    }

    fn frame_size(&self) -> usize {
        4 * self.axis_count as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub header: TrajHeader,
    /// Degrees
    pub samples: Vec<f64>,
}

impl Trajectory {
    pub fn new(dt_us: u32, angle_scale: u32, samples: Vec<f64>) -> Self {
        Self {
            header: TrajHeader::single_axis(dt_us, samples.len() as u64, angle_scale),
            samples,
        }
    }

    pub fn encode(&self) -> Result<BytesMut, TrajFileError> {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + 4 * self.samples.len());
        let header = TrajHeader {
            axis_count: 1,
            total_samples: self.samples.len() as u64,
            ..self.header
        };
        header.encode(&mut buf);

        let scale = header.angle_scale as f64;
        for deg in &self.samples {
            let q = (deg * scale).round();
            if !(i32::MIN as f64..=i32::MAX as f64).contains(&q) {
                return Err(TrajFileError::Overflow(*deg));
            }
            buf.put_i32_le(q as i32);
        }
        Ok(buf)
    }

    /// `axis` selects the component of legacy three-axis files
    pub fn decode(mut data: &[u8], axis: usize) -> Result<Self, TrajFileError> {
        let header = TrajHeader::decode(&mut data)?;
        if axis >= header.axis_count as usize {
            return Err(TrajFileError::AxisIndex {
                index: axis,
                axis_count: header.axis_count,
            });
        }

        let frame = header.frame_size();
        let available = (data.len() / frame) as u64;
        if available < header.total_samples {
            return Err(TrajFileError::Truncated {
                expected: header.total_samples,
                got: available,
            });
        }

        let scale = header.angle_scale as f64;
        let samples = data
            .chunks_exact(frame)
            .take(header.total_samples as usize)
            .map(|mut chunk| {
                chunk.advance(axis * 4);
                chunk.get_i32_le() as f64 / scale
            })
            .collect();

        Ok(Self { header, samples })
    }

    pub fn read_from(mut r: impl Read, axis: usize) -> Result<Self, TrajFileError> {
        let mut data = vec![];
        r.read_to_end(&mut data)?;
        Self::decode(&data, axis)
    }

    pub fn load(path: impl AsRef<Path>, axis: usize) -> Result<Self, TrajFileError> {
        let file = std::fs::File::open(path)?;
        Self::read_from(std::io::BufReader::new(file), axis)
    }

    /// Write next to `path` first and rename, readers never see a partial file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrajFileError> {
        let data = self.encode()?;
        write_atomic(path.as_ref(), &data)?;
        Ok(())
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        let dt_us = self.header.sample_dt_us as u64;
        (0..self.samples.len() as u64).map(move |i| (i * dt_us) as f64 / 1e6)
    }

    pub fn write_csv(&self, mut w: impl Write) -> std::io::Result<()> {
        writeln!(w, "time_s,angle_deg")?;
        for (t, a) in self.times().zip(self.samples.iter()) {
            writeln!(w, "{},{}", t, a)?;
        }
        w.flush()
    }
}

/// Every writer gets its own temporary file in the target directory, so
/// concurrent saves of one path end with the last rename.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl std::fmt::Display for TrajHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  magic         : 0x{:08X}", self.magic)?;
        writeln!(f, "  version       : {}", self.version)?;
        writeln!(f, "  axis_count    : {}", self.axis_count)?;
        writeln!(f, "  reserved      : {}", self.reserved)?;
        writeln!(f, "  sample_dt_us  : {}", self.sample_dt_us)?;
        writeln!(f, "  total         : {}", self.total_samples)?;
        writeln!(f, "  angle_scale   : {}", self.angle_scale)?;
        writeln!(f, "  flags         : {}", self.flags)?;
        writeln!(f, "  header_crc32  : {}", self.header_crc32)
    }
}
