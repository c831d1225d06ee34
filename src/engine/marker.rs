// src/engine/marker.rs
//
// Marker resolution and segment classification.
// Both are pure lookups on a single byte; the scanner calls them for the byte
// that follows every 0xFF.

/// Prefix byte of every marker, and the value that needs stuffing inside scan data.
pub const MARKER_PREFIX: u8 = 0xFF;

pub const SOI: u8 = 0xD8;
pub const EOI: u8 = 0xD9;
pub const SOF0: u8 = 0xC0;
pub const SOF2: u8 = 0xC2;
pub const DHT: u8 = 0xC4;
pub const DQT: u8 = 0xDB;
pub const DRI: u8 = 0xDD;
pub const SOS: u8 = 0xDA;
pub const COM: u8 = 0xFE;
/// 0xFF 0x00 encodes a literal 0xFF inside entropy-coded data.
pub const STUFFED_ZERO: u8 = 0x00;

/// What the byte after an 0xFF means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    StartOfImage,
    EndOfImage,
    StartOfFrameBaseline,
    StartOfFrameProgressive,
    HuffmanTable,
    QuantizationTable,
    RestartInterval,
    StartOfScan,
    /// RST0..RST7
    Restart(u8),
    /// APP0..APP15
    Application(u8),
    Comment,
    /// 0xFF 0x00: a stuffed literal 0xFF, not a marker.
    EscapedFF,
    /// The 0xFF was padding (or garbage); the byte is not a recognised marker.
    NotAMarker,
}

/// Map the byte following an 0xFF to the marker it introduces.
///
/// Total: every byte value resolves to exactly one kind.
pub fn resolve(byte: u8) -> MarkerKind {
    match byte {
        SOI => MarkerKind::StartOfImage,
        EOI => MarkerKind::EndOfImage,
        SOF0 => MarkerKind::StartOfFrameBaseline,
        SOF2 => MarkerKind::StartOfFrameProgressive,
        DHT => MarkerKind::HuffmanTable,
        DQT => MarkerKind::QuantizationTable,
        DRI => MarkerKind::RestartInterval,
        SOS => MarkerKind::StartOfScan,
        0xD0..=0xD7 => MarkerKind::Restart(byte & 0x0F),
        0xE0..=0xEF => MarkerKind::Application(byte & 0x0F),
        COM => MarkerKind::Comment,
        STUFFED_ZERO => MarkerKind::EscapedFF,
        _ => MarkerKind::NotAMarker,
    }
}

/// Whether a segment of this kind carries a length-prefixed payload region.
///
/// SOI, EOI and the restart markers stand alone. `EscapedFF` and `NotAMarker`
/// never open a segment, so the answer for them is irrelevant to the scanner;
/// they report `true` to keep the function total and the rule one line long.
pub fn has_payload(kind: MarkerKind) -> bool {
    !matches!(
        kind,
        MarkerKind::StartOfImage | MarkerKind::EndOfImage | MarkerKind::Restart(_)
    )
}

impl MarkerKind {
    pub fn has_payload(self) -> bool {
        has_payload(self)
    }

    /// True for kinds that open a segment (everything except the escape and padding cases).
    pub fn is_marker(self) -> bool {
        !matches!(self, MarkerKind::EscapedFF | MarkerKind::NotAMarker)
    }

    /// The marker code byte, if this kind is a real marker.
    pub fn code(self) -> Option<u8> {
        let code = match self {
            MarkerKind::StartOfImage => SOI,
            MarkerKind::EndOfImage => EOI,
            MarkerKind::StartOfFrameBaseline => SOF0,
            MarkerKind::StartOfFrameProgressive => SOF2,
            MarkerKind::HuffmanTable => DHT,
            MarkerKind::QuantizationTable => DQT,
            MarkerKind::RestartInterval => DRI,
            MarkerKind::StartOfScan => SOS,
            MarkerKind::Restart(n) => 0xD0 | (n & 0x07),
            MarkerKind::Application(n) => 0xE0 | (n & 0x0F),
            MarkerKind::Comment => COM,
            MarkerKind::EscapedFF | MarkerKind::NotAMarker => return None,
        };
        Some(code)
    }

    pub fn short_name(self) -> &'static str {
        match self {
            MarkerKind::StartOfImage => "SOI",
            MarkerKind::EndOfImage => "EOI",
            MarkerKind::StartOfFrameBaseline => "SOF0",
            MarkerKind::StartOfFrameProgressive => "SOF2",
            MarkerKind::HuffmanTable => "DHT",
            MarkerKind::QuantizationTable => "DQT",
            MarkerKind::RestartInterval => "DRI",
            MarkerKind::StartOfScan => "SOS",
            MarkerKind::Restart(_) => "RST",
            MarkerKind::Application(_) => "APP",
            MarkerKind::Comment => "COM",
            MarkerKind::EscapedFF => "FF00",
            MarkerKind::NotAMarker => "none",
        }
    }
}
