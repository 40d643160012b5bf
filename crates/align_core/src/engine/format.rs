//! Sample format conversion.
//!
//! Every signal entering the engine is widened or narrowed to `f32`
//! before normalization. `SampleBuffer` is a typed view over the caller's
//! samples, so the conversion is a single exhaustive match.

use std::ffi::{c_long, c_longlong};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{try_with_capacity, EngineError, EngineResult};

/// Raw PCM encodings accepted by the engine.
///
/// `Int64` is the platform `long` and `Int64Wide` the platform `long long`;
/// their byte widths follow the target's C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    Int8,
    Int16,
    Int32,
    Int64,
    Int64Wide,
    Float32,
    Float64,
}

impl SampleFormat {
    /// All formats, in tag order.
    pub const ALL: [SampleFormat; 7] = [
        SampleFormat::Int8,
        SampleFormat::Int16,
        SampleFormat::Int32,
        SampleFormat::Int64,
        SampleFormat::Int64Wide,
        SampleFormat::Float32,
        SampleFormat::Float64,
    ];

    /// Size of one sample in bytes on this platform.
    pub fn byte_width(&self) -> usize {
        match self {
            SampleFormat::Int8 => 1,
            SampleFormat::Int16 => 2,
            SampleFormat::Int32 => 4,
            SampleFormat::Int64 => std::mem::size_of::<c_long>(),
            SampleFormat::Int64Wide => std::mem::size_of::<c_longlong>(),
            SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 8,
        }
    }

    /// Resolve a numeric format tag.
    pub fn from_tag(tag: i32) -> EngineResult<Self> {
        usize::try_from(tag)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or_else(|| EngineError::invalid(format!("unrecognized sample format tag {tag}")))
    }

    /// Numeric tag of this format.
    pub fn tag(&self) -> i32 {
        match self {
            SampleFormat::Int8 => 0,
            SampleFormat::Int16 => 1,
            SampleFormat::Int32 => 2,
            SampleFormat::Int64 => 3,
            SampleFormat::Int64Wide => 4,
            SampleFormat::Float32 => 5,
            SampleFormat::Float64 => 6,
        }
    }
}

impl FromStr for SampleFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int8" | "i8" | "byte" => Ok(SampleFormat::Int8),
            "int16" | "i16" | "short" => Ok(SampleFormat::Int16),
            "int32" | "i32" | "int" => Ok(SampleFormat::Int32),
            "int64" | "long" => Ok(SampleFormat::Int64),
            "int64wide" | "long_long" | "longlong" => Ok(SampleFormat::Int64Wide),
            "float32" | "f32" | "single" => Ok(SampleFormat::Float32),
            "float64" | "f64" | "double" => Ok(SampleFormat::Float64),
            other => Err(EngineError::invalid(format!("unrecognized sample format '{other}'"))),
        }
    }
}

/// Borrowed mono samples in one of the supported encodings.
#[derive(Debug, Clone, Copy)]
pub enum SampleBuffer<'a> {
    Int8(&'a [i8]),
    Int16(&'a [i16]),
    Int32(&'a [i32]),
    Int64(&'a [c_long]),
    Int64Wide(&'a [c_longlong]),
    Float32(&'a [f32]),
    Float64(&'a [f64]),
}

impl<'a> SampleBuffer<'a> {
    /// Encoding of these samples.
    pub fn format(&self) -> SampleFormat {
        match self {
            SampleBuffer::Int8(_) => SampleFormat::Int8,
            SampleBuffer::Int16(_) => SampleFormat::Int16,
            SampleBuffer::Int32(_) => SampleFormat::Int32,
            SampleBuffer::Int64(_) => SampleFormat::Int64,
            SampleBuffer::Int64Wide(_) => SampleFormat::Int64Wide,
            SampleBuffer::Float32(_) => SampleFormat::Float32,
            SampleBuffer::Float64(_) => SampleFormat::Float64,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::Int8(s) => s.len(),
            SampleBuffer::Int16(s) => s.len(),
            SampleBuffer::Int32(s) => s.len(),
            SampleBuffer::Int64(s) => s.len(),
            SampleBuffer::Int64Wide(s) => s.len(),
            SampleBuffer::Float32(s) => s.len(),
            SampleBuffer::Float64(s) => s.len(),
        }
    }

    /// Check if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to a freshly allocated `f32` buffer.
    ///
    /// `Float32` input is copied verbatim.
    pub fn to_f32(&self) -> EngineResult<Vec<f32>> {
        let mut out = try_with_capacity::<f32>(self.len())?;
        match *self {
            SampleBuffer::Int8(s) => out.extend(s.iter().map(|&x| x as f32)),
            SampleBuffer::Int16(s) => out.extend(s.iter().map(|&x| x as f32)),
            SampleBuffer::Int32(s) => out.extend(s.iter().map(|&x| x as f32)),
            SampleBuffer::Int64(s) => out.extend(s.iter().map(|&x| x as f32)),
            SampleBuffer::Int64Wide(s) => out.extend(s.iter().map(|&x| x as f32)),
            SampleBuffer::Float32(s) => out.extend_from_slice(s),
            SampleBuffer::Float64(s) => out.extend(s.iter().map(|&x| x as f32)),
        }
        Ok(out)
    }
}

/// Decode native-endian raw bytes tagged with `format` into `f32` samples.
///
/// Fails with `InvalidArgument` when the byte count is not a whole number
/// of samples.
pub fn convert_raw(format: SampleFormat, bytes: &[u8]) -> EngineResult<Vec<f32>> {
    let width = format.byte_width();
    if bytes.len() % width != 0 {
        return Err(EngineError::invalid(format!(
            "{} bytes is not a multiple of the {:?} sample width ({width})",
            bytes.len(),
            format
        )));
    }

    let mut out = try_with_capacity::<f32>(bytes.len() / width)?;
    let chunks = bytes.chunks_exact(width);
    match format {
        SampleFormat::Int8 => out.extend(bytes.iter().map(|&b| b as i8 as f32)),
        SampleFormat::Int16 => {
            out.extend(chunks.map(|c| i16::from_ne_bytes([c[0], c[1]]) as f32))
        }
        SampleFormat::Int32 => {
            out.extend(chunks.map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as f32))
        }
        SampleFormat::Int64 | SampleFormat::Int64Wide => out.extend(chunks.map(|c| {
            if width == 8 {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(c);
                i64::from_ne_bytes(raw) as f32
            } else {
                i32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as f32
            }
        })),
        SampleFormat::Float32 => {
            out.extend(chunks.map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])))
        }
        SampleFormat::Float64 => out.extend(chunks.map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            f64::from_ne_bytes(raw) as f32
        })),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_formats_keep_numeric_value() {
        assert_eq!(
            SampleBuffer::Int8(&[-128, 0, 127]).to_f32().unwrap(),
            vec![-128.0, 0.0, 127.0]
        );
        assert_eq!(
            SampleBuffer::Int16(&[-32768, 1, 32767]).to_f32().unwrap(),
            vec![-32768.0, 1.0, 32767.0]
        );
        assert_eq!(
            SampleBuffer::Int32(&[-70000, 70000]).to_f32().unwrap(),
            vec![-70000.0, 70000.0]
        );
        assert_eq!(SampleBuffer::Int64(&[-5, 9]).to_f32().unwrap(), vec![-5.0, 9.0]);
        assert_eq!(SampleBuffer::Int64Wide(&[3, -3]).to_f32().unwrap(), vec![3.0, -3.0]);
    }

    #[test]
    fn float32_is_copied_verbatim() {
        let samples = [0.1f32, -0.25, 1.0e-7, f32::MAX];
        assert_eq!(SampleBuffer::Float32(&samples).to_f32().unwrap(), samples.to_vec());
    }

    #[test]
    fn float64_is_narrowed() {
        let out = SampleBuffer::Float64(&[0.5, -1.5]).to_f32().unwrap();
        assert_eq!(out, vec![0.5f32, -1.5f32]);
    }

    #[test]
    fn buffer_reports_format_and_len() {
        let buf = SampleBuffer::Int16(&[1, 2, 3]);
        assert_eq!(buf.format(), SampleFormat::Int16);
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
        assert!(SampleBuffer::Float32(&[]).is_empty());
    }

    #[test]
    fn tags_round_trip() {
        for format in SampleFormat::ALL {
            assert_eq!(SampleFormat::from_tag(format.tag()).unwrap(), format);
        }
    }

    #[test]
    fn unknown_tag_is_invalid_argument() {
        assert!(SampleFormat::from_tag(7).is_err());
        assert!(SampleFormat::from_tag(-1).is_err());
        assert!("pcm24".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("short".parse::<SampleFormat>().unwrap(), SampleFormat::Int16);
        assert_eq!("Float32".parse::<SampleFormat>().unwrap(), SampleFormat::Float32);
        assert_eq!("long_long".parse::<SampleFormat>().unwrap(), SampleFormat::Int64Wide);
    }

    #[test]
    fn raw_bytes_decode_native_endian() {
        let values: [i16; 3] = [-2, 0, 300];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(
            convert_raw(SampleFormat::Int16, &bytes).unwrap(),
            vec![-2.0, 0.0, 300.0]
        );

        let floats: [f64; 2] = [0.25, -4.0];
        let bytes: Vec<u8> = floats.iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(convert_raw(SampleFormat::Float64, &bytes).unwrap(), vec![0.25, -4.0]);

        let longs: [c_long; 2] = [7, -7];
        let bytes: Vec<u8> = longs.iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(convert_raw(SampleFormat::Int64, &bytes).unwrap(), vec![7.0, -7.0]);
    }

    #[test]
    fn raw_bytes_reject_partial_samples() {
        assert!(convert_raw(SampleFormat::Int32, &[0, 0, 0]).is_err());
        assert!(convert_raw(SampleFormat::Int8, &[1, 2, 3]).is_ok());
    }
}
