// src/engine/scanner.rs
//
// Segment-boundary state machine.
//
// Consumes a JPEG byte stream one byte at a time and decides, for every byte,
// which segment it belongs to and whether the corruption pipeline may touch
// it. The machine never looks ahead: the role of a byte depends only on the
// bytes before it, so any chunking of the input yields the same roles.

use crate::engine::config::{CorruptionConfig, HeaderSkip, WindowGate};
use crate::engine::marker::{resolve, MarkerKind, MARKER_PREFIX};
use tracing::trace;

/// Running state of the scanner. Exactly one is live; each input byte yields
/// exactly one successor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParserState {
    #[default]
    NotStarted,
    /// Before the first marker, or after 0xFF padding outside any segment.
    PaddingOrMetadata,
    /// Saw an 0xFF outside any segment.
    Escape,
    /// The byte just consumed was the code byte of this marker.
    MarkerIndicator(MarkerKind),
    InSegment(MarkerKind),
    /// Saw an 0xFF inside this segment.
    SegmentEscape(MarkerKind),
    /// Consumed the 0x00 of an 0xFF 0x00 pair inside this segment.
    SegmentEscapedFF(MarkerKind),
}

impl ParserState {
    /// Transition on one byte.
    ///
    /// A run of 0xFF bytes is fill: the machine stays in its escape state
    /// until a non-0xFF byte says what the run introduced.
    pub fn next(self, byte: u8) -> ParserState {
        use ParserState::*;

        match self {
            NotStarted | PaddingOrMetadata => {
                if byte == MARKER_PREFIX {
                    Escape
                } else {
                    PaddingOrMetadata
                }
            }
            Escape => match resolve(byte) {
                MarkerKind::NotAMarker if byte == MARKER_PREFIX => Escape,
                // Padding, or an escaped 0xFF before any real marker.
                MarkerKind::NotAMarker | MarkerKind::EscapedFF => PaddingOrMetadata,
                marker => MarkerIndicator(marker),
            },
            MarkerIndicator(current) | InSegment(current) | SegmentEscapedFF(current) => {
                if byte == MARKER_PREFIX {
                    SegmentEscape(current)
                } else {
                    InSegment(current)
                }
            }
            SegmentEscape(current) => match resolve(byte) {
                MarkerKind::NotAMarker if byte == MARKER_PREFIX => SegmentEscape(current),
                MarkerKind::NotAMarker => InSegment(current),
                MarkerKind::EscapedFF => SegmentEscapedFF(current),
                marker => MarkerIndicator(marker),
            },
        }
    }

    /// The segment this state is inside of, if any.
    pub fn segment(self) -> Option<MarkerKind> {
        match self {
            ParserState::NotStarted | ParserState::PaddingOrMetadata | ParserState::Escape => None,
            ParserState::MarkerIndicator(kind)
            | ParserState::InSegment(kind)
            | ParserState::SegmentEscape(kind)
            | ParserState::SegmentEscapedFF(kind) => Some(kind),
        }
    }

    /// True when the last consumed byte was an 0xFF whose meaning is still open.
    pub fn awaiting_marker(self) -> bool {
        matches!(self, ParserState::Escape | ParserState::SegmentEscape(_))
    }
}

bitflags::bitflags! {
    /// What a single byte is, as decided at the moment it was consumed.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ByteRole: u8 {
        /// Outside every segment: leading junk or padding.
        const METADATA = 1 << 0;
        /// An 0xFF whose meaning depends on the next byte.
        const PREFIX = 1 << 1;
        /// The code byte of a recognised marker.
        const MARKER = 1 << 2;
        /// The 0x00 of an 0xFF 0x00 pair.
        const STUFFING = 1 << 3;
        /// Content of a payload-carrying segment.
        const PAYLOAD = 1 << 4;
        /// Inside an open scan (SOS payload, or a followed restart interval).
        const SCAN = 1 << 5;
        /// Inside the protected scan header.
        const SCAN_HEADER = 1 << 6;
        /// May be handed to the corruption algorithms.
        const ELIGIBLE = 1 << 7;
    }
}

impl ByteRole {
    pub fn is_eligible(self) -> bool {
        self.contains(ByteRole::ELIGIBLE)
    }
}

/// One marker-delimited region of the stream.
///
/// Positions are absolute byte offsets; ends are exclusive. `marker_start` is
/// the first 0xFF of the prefix run, `marker_end` is one past the code byte.
/// The payload range exists only for payload-carrying kinds and is closed
/// when the next marker is recognised, or at end of stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub kind: MarkerKind,
    pub marker_start: u64,
    pub marker_end: u64,
    pub payload_start: Option<u64>,
    pub payload_end: Option<u64>,
}

impl Segment {
    pub fn payload_len(&self) -> Option<u64> {
        match (self.payload_start, self.payload_end) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Where we are inside an open scan.
#[derive(Clone, Copy, Debug)]
struct ScanCursor {
    /// Bytes consumed since the SOS code byte, before the current one.
    offset: u64,
    /// Protected prefix length; `None` until the declared length is read.
    skip: Option<u64>,
    declared_high: u8,
}

impl ScanCursor {
    fn open(header_skip: HeaderSkip) -> Self {
        Self {
            offset: 0,
            skip: match header_skip {
                HeaderSkip::Fixed(n) => Some(n as u64),
                HeaderSkip::DeclaredLength => None,
            },
            declared_high: 0,
        }
    }

    /// Advance over `byte`, returning its offset inside the scan.
    fn advance(&mut self, byte: u8) -> u64 {
        let offset = self.offset;
        if self.skip.is_none() {
            match offset {
                0 => self.declared_high = byte,
                1 => {
                    let declared = u16::from_be_bytes([self.declared_high, byte]);
                    self.skip = Some(u64::from(declared.max(2)));
                }
                _ => {}
            }
        }
        self.offset += 1;
        offset
    }

    fn in_header(&self, offset: u64) -> bool {
        match self.skip {
            Some(skip) => offset < skip,
            None => true,
        }
    }
}

/// The segment-boundary state machine plus the bookkeeping needed to turn its
/// states into per-byte roles.
#[derive(Clone, Debug)]
pub struct SegmentScanner {
    state: ParserState,
    position: u64,
    header_skip: HeaderSkip,
    follow_restarts: bool,
    scan: Option<ScanCursor>,
    window: Option<WindowGate>,
    /// Eligible bytes seen so far, before the window is applied.
    candidates: u64,
    prefix_start: u64,
    segments: Option<Vec<Segment>>,
}

impl SegmentScanner {
    pub fn new(config: &CorruptionConfig) -> Self {
        Self {
            state: ParserState::NotStarted,
            position: 0,
            header_skip: config.header_skip,
            follow_restarts: config.follow_restarts,
            scan: None,
            window: config.window.map(|w| w.gate()),
            candidates: 0,
            prefix_start: 0,
            segments: None,
        }
    }

    /// Like [`SegmentScanner::new`], but also keeps the list of segments.
    pub fn recording(config: &CorruptionConfig) -> Self {
        let mut scanner = Self::new(config);
        scanner.segments = Some(Vec::new());
        scanner
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Segments recognised so far. The last one may still be open.
    pub fn segments(&self) -> &[Segment] {
        self.segments.as_deref().unwrap_or(&[])
    }

    /// Close the open segment at end of stream and hand back the segment list.
    pub fn finish(mut self) -> Vec<Segment> {
        let end = self.position;
        let mut segments = self.segments.take().unwrap_or_default();
        if let Some(last) = segments.last_mut() {
            if last.payload_start.is_some() && last.payload_end.is_none() {
                last.payload_end = Some(end.max(last.payload_start.unwrap_or(end)));
            }
        }
        segments
    }

    /// Consume one byte and report its role.
    pub fn step(&mut self, byte: u8) -> ByteRole {
        let previous = self.state;
        let next = previous.next(byte);
        let position = self.position;
        self.position += 1;
        self.state = next;

        match next {
            ParserState::NotStarted | ParserState::PaddingOrMetadata => ByteRole::METADATA,
            ParserState::Escape => {
                if !previous.awaiting_marker() {
                    self.prefix_start = position;
                }
                ByteRole::PREFIX
            }
            ParserState::MarkerIndicator(kind) => {
                self.on_marker(kind, position);
                ByteRole::MARKER
            }
            ParserState::SegmentEscape(_) => {
                if !previous.awaiting_marker() {
                    self.prefix_start = position;
                }
                ByteRole::PREFIX | self.scan_role(byte).0
            }
            ParserState::SegmentEscapedFF(_) => ByteRole::STUFFING | self.scan_role(byte).0,
            ParserState::InSegment(kind) => {
                let mut role = if kind.has_payload() {
                    ByteRole::PAYLOAD
                } else {
                    ByteRole::empty()
                };
                let (scan_role, candidate) = self.scan_role(byte);
                role |= scan_role;
                // The byte right after an 0xFF stays put so no marker or
                // escape pair can appear or vanish.
                if candidate && !previous.awaiting_marker() && self.admit() {
                    role |= ByteRole::ELIGIBLE;
                }
                role
            }
        }
    }

    /// Feed a chunk, appending one role per byte to `roles`.
    pub fn feed(&mut self, chunk: &[u8], roles: &mut Vec<ByteRole>) {
        roles.reserve(chunk.len());
        for &byte in chunk {
            roles.push(self.step(byte));
        }
    }

    /// Scan bookkeeping for a byte inside a segment. Returns the scan flags
    /// and whether the byte is past the protected header.
    fn scan_role(&mut self, byte: u8) -> (ByteRole, bool) {
        match self.scan.as_mut() {
            Some(cursor) => {
                let offset = cursor.advance(byte);
                if cursor.in_header(offset) {
                    (ByteRole::SCAN | ByteRole::SCAN_HEADER, false)
                } else {
                    (ByteRole::SCAN, true)
                }
            }
            None => (ByteRole::empty(), false),
        }
    }

    fn admit(&mut self) -> bool {
        let n = self.candidates;
        self.candidates += 1;
        match self.window.as_mut() {
            Some(gate) => gate.admits(n),
            None => true,
        }
    }

    fn on_marker(&mut self, kind: MarkerKind, position: u64) {
        trace!(target: "crunge::scan", marker = kind.short_name(), position, "marker");

        match kind {
            MarkerKind::StartOfScan => self.scan = Some(ScanCursor::open(self.header_skip)),
            // RSTn inside a followed scan leaves the cursor running.
            MarkerKind::Restart(_) if self.follow_restarts && self.scan.is_some() => {}
            _ => self.scan = None,
        }

        let marker_start = self.prefix_start;
        if let Some(segments) = self.segments.as_mut() {
            if let Some(last) = segments.last_mut() {
                if last.payload_start.is_some() && last.payload_end.is_none() {
                    last.payload_end = Some(marker_start.max(last.payload_start.unwrap_or(0)));
                }
            }
            let marker_end = position + 1;
            let has_payload = kind.has_payload();
            segments.push(Segment {
                kind,
                marker_start,
                marker_end,
                payload_start: has_payload.then_some(marker_end),
                payload_end: None,
            });
        }
    }
}

/// Roles for a whole buffer.
pub fn classify(input: &[u8], config: &CorruptionConfig) -> Vec<ByteRole> {
    let mut scanner = SegmentScanner::new(config);
    let mut roles = Vec::with_capacity(input.len());
    scanner.feed(input, &mut roles);
    roles
}

/// Segment list for a whole buffer.
pub fn segments(input: &[u8]) -> Vec<Segment> {
    let mut scanner = SegmentScanner::recording(&CorruptionConfig::default());
    for &byte in input {
        scanner.step(byte);
    }
    scanner.finish()
}
