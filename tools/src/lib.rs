//! Encoding and inspection tools for netpack packets.
//!
//! This crate backs the `netpack-tools` binary:
//!
//! - Encode a framed packet from typed field specs
//! - Split a captured byte stream into frames
//! - Decode a frame's fields against a layout
//!
//! # Design Principles
//!
//! - **Same code path as the protocol** - Every tool drives the real
//!   [`packet::Packet`] and [`packet::Channel`], so what the tools accept is
//!   what a peer would accept.
//! - **Human-readable output** - Make it easy to see what is on the wire.

use std::fmt::Write as _;
use std::io::{Read, Write};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use packet::{
    read_size_field, Channel, ChannelError, ConnectionId, Limits, Packet, PacketType, HEADER_SIZE,
};
use serde::{Deserialize, Serialize};
use serial::{ByteRead, ByteWrite};
use tracing::debug;

/// The field types a layout can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    /// Zero-terminated string.
    Str,
    /// `u16` length-prefixed byte buffer.
    Buf,
}

impl FromStr for FieldKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.trim() {
            "bool" => Self::Bool,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "str" => Self::Str,
            "buf" => Self::Buf,
            other => bail!("unknown field kind `{other}`"),
        };
        Ok(kind)
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Str(String),
    Buf(Vec<u8>),
}

impl FieldValue {
    /// Parses a `kind:value` spec such as `u16:4660`, `u16:0x1234`,
    /// `str:hello` or `buf:0a0b0c`.
    pub fn parse_spec(spec: &str) -> Result<Self> {
        let (kind, text) = spec
            .split_once(':')
            .ok_or_else(|| anyhow!("field `{spec}` is not in kind:value form"))?;
        let value = match kind.parse::<FieldKind>()? {
            FieldKind::Bool => Self::Bool(
                text.parse()
                    .with_context(|| format!("parse bool `{text}`"))?,
            ),
            FieldKind::U8 => Self::U8(parse_int(text)?),
            FieldKind::U16 => Self::U16(parse_int(text)?),
            FieldKind::U32 => Self::U32(parse_int(text)?),
            FieldKind::U64 => Self::U64(parse_int(text)?),
            FieldKind::I8 => Self::I8(parse_int(text)?),
            FieldKind::I16 => Self::I16(parse_int(text)?),
            FieldKind::I32 => Self::I32(parse_int(text)?),
            FieldKind::I64 => Self::I64(parse_int(text)?),
            FieldKind::Str => Self::Str(text.to_string()),
            FieldKind::Buf => Self::Buf(parse_hex(text)?),
        };
        Ok(value)
    }

    fn write_to(&self, out: &mut impl ByteWrite) -> serial::WriteResult<()> {
        match self {
            Self::Bool(v) => out.write_bool(*v),
            Self::U8(v) => out.write_u8(*v),
            Self::U16(v) => out.write_u16(*v),
            Self::U32(v) => out.write_u32(*v),
            Self::U64(v) => out.write_u64(*v),
            Self::I8(v) => out.write_i8(*v),
            Self::I16(v) => out.write_i16(*v),
            Self::I32(v) => out.write_i32(*v),
            Self::I64(v) => out.write_i64(*v),
            Self::Str(v) => out.write_string(v),
            Self::Buf(v) => out.write_buffer(v),
        }
    }

    fn read_from(kind: FieldKind, input: &mut impl ByteRead) -> Self {
        match kind {
            FieldKind::Bool => Self::Bool(input.read_bool()),
            FieldKind::U8 => Self::U8(input.read_u8()),
            FieldKind::U16 => Self::U16(input.read_u16()),
            FieldKind::U32 => Self::U32(input.read_u32()),
            FieldKind::U64 => Self::U64(input.read_u64()),
            FieldKind::I8 => Self::I8(input.read_i8()),
            FieldKind::I16 => Self::I16(input.read_i16()),
            FieldKind::I32 => Self::I32(input.read_i32()),
            FieldKind::I64 => Self::I64(input.read_i64()),
            FieldKind::Str => Self::Str(input.read_string()),
            FieldKind::Buf => Self::Buf(input.read_buffer()),
        }
    }
}

/// Parses a comma-separated layout such as `u16,str,buf`.
pub fn parse_layout(layout: &str) -> Result<Vec<FieldKind>> {
    layout
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Encodes one framed packet.
pub fn encode_frame(packet_type: PacketType, fields: &[FieldValue], limits: &Limits) -> Result<Vec<u8>> {
    let mut packet = Packet::outbound(packet_type, limits.packet_limit());
    for (index, field) in fields.iter().enumerate() {
        field
            .write_to(&mut packet)
            .with_context(|| format!("write field {index}"))?;
    }
    let size = packet.prepare_to_send().context("finalize packet")?;

    let mut out: Vec<u8> = Vec::with_capacity(size);
    packet
        .transfer_out(Write::write, &mut out)
        .context("copy packet bytes")?;
    debug!(size, packet_type, fields = fields.len(), "encoded frame");
    Ok(out)
}

/// One frame found in a captured stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    pub offset: usize,
    pub size: usize,
    pub packet_type: PacketType,
    pub payload_len: usize,
}

/// Result of splitting a captured stream into frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    pub frames: Vec<FrameSummary>,
    /// Bytes after the last complete frame.
    pub trailing_bytes: usize,
    /// The framing violation that stopped the scan, if any.
    pub violation: Option<String>,
}

/// Splits `bytes` into frames the way a stream connection would receive them.
///
/// Stops at the first framing violation or at an incomplete trailing frame.
pub fn inspect_stream(bytes: &[u8], limits: &Limits) -> InspectReport {
    let mut channel = Channel::new(ConnectionId::new(0), limits.clone());
    let mut source = bytes;
    let mut report = InspectReport {
        frames: Vec::new(),
        trailing_bytes: 0,
        violation: None,
    };

    while !source.is_empty() {
        let offset = bytes.len() - source.len();
        match channel.receive_packet(Read::read, &mut source) {
            Ok(Some(packet)) => report.frames.push(FrameSummary {
                offset,
                size: packet.size(),
                packet_type: packet.packet_type(),
                payload_len: packet.size() - HEADER_SIZE,
            }),
            Ok(None) | Err(ChannelError::PeerClosed) => {
                report.trailing_bytes = bytes.len() - offset;
                break;
            }
            Err(err) => {
                report.trailing_bytes = bytes.len() - offset;
                report.violation = Some(err.to_string());
                break;
            }
        }
    }
    report
}

/// Fields decoded from one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    pub packet_type: PacketType,
    pub fields: Vec<FieldValue>,
    /// Payload bytes left after the layout was read.
    pub remaining: usize,
    /// The underrun that would close the connection, if any.
    pub underrun: Option<String>,
}

/// Decodes the first frame of `bytes` against `layout`.
pub fn decode_frame(bytes: &[u8], layout: &[FieldKind], limits: &Limits) -> Result<DecodeReport> {
    let declared = read_size_field(bytes).map_or(bytes.len(), usize::from);
    let frame = bytes.get(..declared).unwrap_or(bytes);
    let mut packet =
        Packet::received(ConnectionId::new(0), limits.packet_limit(), frame).context("frame rejected")?;

    let fields = layout
        .iter()
        .map(|kind| FieldValue::read_from(*kind, &mut packet))
        .collect();
    Ok(DecodeReport {
        packet_type: packet.packet_type(),
        fields,
        remaining: packet.remaining(),
        underrun: packet.violation().map(|violation| violation.to_string()),
    })
}

/// Formats bytes as lowercase hex without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parses hex text, ignoring whitespace.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        bail!("hex `{text}` has an odd number of digits");
    }
    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).context("hex is not ascii")?;
            u8::from_str_radix(pair, 16).with_context(|| format!("invalid hex byte `{pair}`"))
        })
        .collect()
}

pub fn format_inspect_pretty(report: &InspectReport) -> String {
    let mut out = String::new();
    for frame in &report.frames {
        let _ = writeln!(
            out,
            "@{:<6} type {:<3} size {:<5} payload {} bytes",
            frame.offset, frame.packet_type, frame.size, frame.payload_len
        );
    }
    let _ = writeln!(out, "frames: {}", report.frames.len());
    if report.trailing_bytes > 0 {
        let _ = writeln!(out, "trailing: {} bytes", report.trailing_bytes);
    }
    if let Some(violation) = &report.violation {
        let _ = writeln!(out, "violation: {violation}");
    }
    out
}

pub fn format_decode_pretty(report: &DecodeReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "type: {}", report.packet_type);
    for (index, field) in report.fields.iter().enumerate() {
        let text = match field {
            FieldValue::Bool(v) => format!("bool {v}"),
            FieldValue::U8(v) => format!("u8 {v}"),
            FieldValue::U16(v) => format!("u16 {v}"),
            FieldValue::U32(v) => format!("u32 {v}"),
            FieldValue::U64(v) => format!("u64 {v}"),
            FieldValue::I8(v) => format!("i8 {v}"),
            FieldValue::I16(v) => format!("i16 {v}"),
            FieldValue::I32(v) => format!("i32 {v}"),
            FieldValue::I64(v) => format!("i64 {v}"),
            FieldValue::Str(v) => format!("str {v:?}"),
            FieldValue::Buf(v) => format!("buf {}", to_hex(v)),
        };
        let _ = writeln!(out, "  [{index}] {text}");
    }
    if report.remaining > 0 {
        let _ = writeln!(out, "remaining: {} bytes", report.remaining);
    }
    if let Some(underrun) = &report.underrun {
        let _ = writeln!(out, "underrun: {underrun}");
    }
    out
}

fn parse_int<T: TryFrom<i128>>(text: &str) -> Result<T> {
    let value = match text.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16),
        None => text.parse::<i128>(),
    }
    .with_context(|| format!("parse integer `{text}`"))?;
    T::try_from(value).map_err(|_| anyhow!("integer `{text}` is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(items: &[&str]) -> Vec<FieldValue> {
        items
            .iter()
            .map(|spec| FieldValue::parse_spec(spec).unwrap())
            .collect()
    }

    #[test]
    fn parse_field_specs() {
        assert_eq!(
            specs(&["u16:0x1234", "str:hi", "i8:-1", "bool:true", "buf:0a0b"]),
            vec![
                FieldValue::U16(0x1234),
                FieldValue::Str("hi".to_string()),
                FieldValue::I8(-1),
                FieldValue::Bool(true),
                FieldValue::Buf(vec![0x0a, 0x0b]),
            ]
        );
    }

    #[test]
    fn parse_field_spec_errors() {
        assert!(FieldValue::parse_spec("u8:256").is_err());
        assert!(FieldValue::parse_spec("u8").is_err());
        assert!(FieldValue::parse_spec("f32:1.0").is_err());
        assert!(FieldValue::parse_spec("buf:abc").is_err());
    }

    #[test]
    fn encode_known_frame() {
        let bytes = encode_frame(5, &specs(&["u16:4660", "str:hi"]), &Limits::default()).unwrap();
        assert_eq!(bytes, [0x08, 0x00, 0x05, 0x34, 0x12, 0x68, 0x69, 0x00]);
    }

    #[test]
    fn encode_over_limit_fails() {
        let limits = Limits {
            max_packet_bytes: 8,
            ..Limits::default()
        };
        let err = encode_frame(1, &specs(&["u64:1"]), &limits).unwrap_err();
        assert!(format!("{err:#}").contains("limit is 8"));
    }

    #[test]
    fn inspect_splits_stream() {
        let limits = Limits::default();
        let mut stream = encode_frame(1, &specs(&["u8:1"]), &limits).unwrap();
        stream.extend(encode_frame(2, &specs(&["str:abc"]), &limits).unwrap());
        stream.extend_from_slice(&[9, 0, 3]);

        let report = inspect_stream(&stream, &limits);
        assert_eq!(
            report.frames,
            vec![
                FrameSummary {
                    offset: 0,
                    size: 4,
                    packet_type: 1,
                    payload_len: 1
                },
                FrameSummary {
                    offset: 4,
                    size: 7,
                    packet_type: 2,
                    payload_len: 4
                },
            ]
        );
        assert_eq!(report.trailing_bytes, 3);
        assert!(report.violation.is_none());
    }

    #[test]
    fn inspect_stops_at_violation() {
        let report = inspect_stream(&[3, 0, 1, 1, 0, 0], &Limits::default());
        assert_eq!(report.frames.len(), 1);
        assert_eq!(report.trailing_bytes, 3);
        assert!(report.violation.unwrap().contains("minimum"));
    }

    #[test]
    fn decode_with_layout() {
        let bytes = encode_frame(5, &specs(&["u16:4660", "str:hi", "buf:ff"]), &Limits::default())
            .unwrap();
        let layout = parse_layout("u16,str,buf").unwrap();
        let report = decode_frame(&bytes, &layout, &Limits::default()).unwrap();
        assert_eq!(report.packet_type, 5);
        assert_eq!(report.fields, specs(&["u16:4660", "str:hi", "buf:ff"]));
        assert_eq!(report.remaining, 0);
        assert!(report.underrun.is_none());
    }

    #[test]
    fn decode_reports_underrun() {
        let bytes = encode_frame(5, &specs(&["u16:4660"]), &Limits::default()).unwrap();
        let layout = parse_layout("u16,str").unwrap();
        let report = decode_frame(&bytes, &layout, &Limits::default()).unwrap();
        assert_eq!(report.fields, specs(&["u16:4660", "str:"]));
        assert!(report.underrun.is_some());
    }

    #[test]
    fn decode_rejects_truncated_frame() {
        assert!(decode_frame(&[8, 0, 5, 0x34], &[], &Limits::default()).is_err());
    }

    #[test]
    fn field_value_json_shape() {
        let json = serde_json::to_string(&FieldValue::U16(7)).unwrap();
        assert_eq!(json, r#"{"kind":"u16","value":7}"#);
    }

    #[test]
    fn hex_roundtrip() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x10]), "00ab10");
        assert_eq!(parse_hex("00 ab 10").unwrap(), vec![0x00, 0xab, 0x10]);
    }

    #[test]
    fn pretty_output_mentions_fields() {
        let bytes = encode_frame(5, &specs(&["str:hi"]), &Limits::default()).unwrap();
        let report = decode_frame(&bytes, &[FieldKind::Str], &Limits::default()).unwrap();
        let text = format_decode_pretty(&report);
        assert!(text.contains("str \"hi\""));
    }
}
