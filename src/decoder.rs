// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Streaming HTTP/3 frame decoder.
//!
//! [`FrameDecoder`] consumes the bytes of one QUIC stream, in whatever
//! fragmentation the transport delivers them, and reports frames through a
//! [`FrameVisitor`]. DATA, HEADERS and the PUSH_PROMISE header block are
//! streamed to the visitor without buffering; structured frames are
//! buffered whole, parsed, and emitted as one event. Any callback may
//! return `false` to pause processing; the next `process_input` call
//! resumes exactly where the previous one stopped.

use std::cmp::min;

use crate::error::ErrorCode;
use crate::frame::{
    CancelPushFrame, DuplicatePushFrame, FrameLengths, GoAwayFrame, MaxPushIdFrame,
    PriorityElementType, PriorityFrame, SettingsFrame, CANCEL_PUSH_FRAME_TYPE, DATA_FRAME_TYPE,
    DUPLICATE_PUSH_FRAME_TYPE, GOAWAY_FRAME_TYPE, HEADERS_FRAME_TYPE, MAX_PUSH_ID_FRAME_TYPE,
    PRIORITY_FRAME_TYPE, PUSH_PROMISE_FRAME_TYPE, SETTINGS_FRAME_TYPE,
};
use crate::octets::{parse_varint_len, ReadableBytes};

/// Longest payload accepted for a PRIORITY frame.
const MAX_PRIORITY_FRAME_LENGTH: u64 = 1024;
/// Longest payload accepted for frames whose payload is a single
/// variable-length integer.
const MAX_VARINT_FRAME_LENGTH: u64 = 8;
/// Longest payload accepted for a SETTINGS frame.
const MAX_SETTINGS_FRAME_LENGTH: u64 = 16 * 1024;

/// Consumer capability set for decoded frames.
///
/// Every method other than [`FrameVisitor::on_error`] returns a
/// continuation flag: `false` pauses the decoder, which then stops
/// consuming input until the caller feeds the unconsumed suffix back in.
/// Payload slices are valid only for the duration of the call; a visitor
/// that must retain payload bytes copies them.
pub trait FrameVisitor {
    /// Called once when the decoder latches an error. No further callbacks
    /// follow and later `process_input` calls are no-ops.
    fn on_error(&mut self, error: ErrorCode, detail: &str);

    /// Called when a PRIORITY frame header has been read.
    fn on_priority_frame_start(&mut self, lengths: FrameLengths) -> bool;

    /// Called when a PRIORITY frame has been completely parsed.
    fn on_priority_frame(&mut self, frame: &PriorityFrame) -> bool;

    /// Called when a CANCEL_PUSH frame has been completely parsed.
    fn on_cancel_push_frame(&mut self, frame: &CancelPushFrame) -> bool;

    /// Called when a MAX_PUSH_ID frame has been completely parsed.
    fn on_max_push_id_frame(&mut self, frame: &MaxPushIdFrame) -> bool;

    /// Called when a GOAWAY frame has been completely parsed.
    fn on_goaway_frame(&mut self, frame: &GoAwayFrame) -> bool;

    /// Called when a SETTINGS frame header has been read.
    fn on_settings_frame_start(&mut self, lengths: FrameLengths) -> bool;

    /// Called when a SETTINGS frame has been completely parsed.
    fn on_settings_frame(&mut self, frame: &SettingsFrame) -> bool;

    /// Called when a DUPLICATE_PUSH frame has been completely parsed.
    fn on_duplicate_push_frame(&mut self, frame: &DuplicatePushFrame) -> bool;

    /// Called when a DATA frame header has been read.
    fn on_data_frame_start(&mut self, lengths: FrameLengths) -> bool;
    /// Called with each contiguous non-empty region of DATA payload. May be
    /// called multiple times per frame.
    fn on_data_frame_payload(&mut self, payload: &[u8]) -> bool;
    /// Called exactly once when a DATA frame has been fully processed.
    fn on_data_frame_end(&mut self) -> bool;

    /// Called when a HEADERS frame header has been read.
    fn on_headers_frame_start(&mut self, lengths: FrameLengths) -> bool;
    /// Called with each contiguous non-empty region of HEADERS payload.
    fn on_headers_frame_payload(&mut self, payload: &[u8]) -> bool;
    /// Called exactly once when a HEADERS frame has been fully processed.
    fn on_headers_frame_end(&mut self) -> bool;

    /// Called once the push id of a PUSH_PROMISE frame has been read from
    /// the payload.
    fn on_push_promise_frame_start(&mut self, push_id: u64) -> bool;
    /// Called with each contiguous non-empty region of the header block.
    fn on_push_promise_frame_payload(&mut self, payload: &[u8]) -> bool;
    /// Called exactly once when a PUSH_PROMISE frame has been fully
    /// processed.
    fn on_push_promise_frame_end(&mut self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecoderState {
    ReadingFrameType,
    ReadingFrameLength,
    ReadingFramePayload,
    FinishParsing,
    Error,
}

/// Accumulates one variable-length integer that may arrive split across
/// `process_input` calls. The wire length is fixed by the first byte, so an
/// 8-byte buffer always suffices.
#[derive(Debug, Default)]
struct VarintAccumulator {
    buf: [u8; 8],
    filled: usize,
    wire_len: usize,
}

impl VarintAccumulator {
    fn is_empty(&self) -> bool {
        self.wire_len == 0
    }

    fn wire_len(&self) -> usize {
        self.wire_len
    }

    /// Consumes bytes from `bytes` until the integer completes or the input
    /// runs out. Returns the value once all wire bytes have arrived.
    fn feed(&mut self, bytes: &mut ReadableBytes<'_>) -> Option<u64> {
        if self.wire_len == 0 {
            let first = bytes.peek_u8().ok()?;
            self.wire_len = parse_varint_len(first);
        }
        let take = min(self.wire_len - self.filled, bytes.cap());
        let region = bytes.take(take);
        self.buf[self.filled..self.filled + take].copy_from_slice(region);
        self.filled += take;
        if self.filled == self.wire_len {
            let mut value = u64::from(self.buf[0] & 0x3f);
            for byte in &self.buf[1..self.wire_len] {
                value = (value << 8) | u64::from(*byte);
            }
            Some(value)
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.filled = 0;
        self.wire_len = 0;
    }
}

/// Reentrant decoder for the HTTP/3 frame layer of one QUIC stream.
///
/// The decoder buffers only partial header fields and, for structured
/// frames, the frame payload (bounded per type). Once an error is latched
/// the decoder never recovers; `process_input` becomes a no-op returning 0.
pub struct FrameDecoder {
    state: DecoderState,
    current_frame_type: u64,
    current_type_field_length: u64,
    current_length_field_length: u64,
    current_frame_length: u64,
    remaining_frame_length: u64,
    push_id_read: bool,
    type_field: VarintAccumulator,
    length_field: VarintAccumulator,
    push_id_field: VarintAccumulator,
    buffer: Vec<u8>,
    error: ErrorCode,
    error_detail: String,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder in its initial state.
    pub fn new() -> Self {
        FrameDecoder {
            state: DecoderState::ReadingFrameType,
            current_frame_type: 0,
            current_type_field_length: 0,
            current_length_field_length: 0,
            current_frame_length: 0,
            remaining_frame_length: 0,
            push_id_read: false,
            type_field: VarintAccumulator::default(),
            length_field: VarintAccumulator::default(),
            push_id_field: VarintAccumulator::default(),
            buffer: Vec::new(),
            error: ErrorCode::NoError,
            error_detail: String::new(),
        }
    }

    /// Feeds bytes into the state machine, invoking `visitor` callbacks.
    ///
    /// Returns the number of bytes consumed, which may be less than
    /// `data.len()` when a callback returned `false`, when an error was
    /// raised, or when the remaining bytes could not complete a header
    /// field and were buffered. Returns 0 and does no work once an error
    /// has been latched. Paused processing resumes by calling this again
    /// with the unconsumed suffix.
    pub fn process_input(&mut self, visitor: &mut dyn FrameVisitor, data: &[u8]) -> usize {
        if self.state == DecoderState::Error {
            return 0;
        }
        let mut bytes = ReadableBytes::from(data);
        let mut continue_processing = true;
        while continue_processing {
            match self.state {
                DecoderState::ReadingFrameType => {
                    if bytes.cap() == 0 {
                        break;
                    }
                    match self.type_field.feed(&mut bytes) {
                        Some(frame_type) => {
                            self.current_frame_type = frame_type;
                            self.current_type_field_length = self.type_field.wire_len() as u64;
                            self.type_field.reset();
                            self.state = DecoderState::ReadingFrameLength;
                        }
                        None => break,
                    }
                }
                DecoderState::ReadingFrameLength => {
                    if bytes.cap() == 0 {
                        break;
                    }
                    match self.length_field.feed(&mut bytes) {
                        Some(length) => {
                            self.current_length_field_length = self.length_field.wire_len() as u64;
                            self.length_field.reset();
                            if length > self.max_frame_length() {
                                self.raise_error(
                                    visitor,
                                    ErrorCode::InternalError,
                                    "Frame is too large",
                                );
                                break;
                            }
                            self.current_frame_length = length;
                            self.remaining_frame_length = length;
                            continue_processing = self.begin_frame_payload(visitor);
                        }
                        None => break,
                    }
                }
                DecoderState::ReadingFramePayload => {
                    if bytes.cap() == 0 {
                        break;
                    }
                    continue_processing = self.read_frame_payload(visitor, &mut bytes);
                }
                DecoderState::FinishParsing => {
                    continue_processing = self.finish_parsing(visitor);
                }
                DecoderState::Error => break,
            }
            if self.state == DecoderState::Error {
                break;
            }
        }
        bytes.index()
    }

    /// Returns a code other than [`ErrorCode::NoError`] iff the visitor's
    /// `on_error` has been invoked.
    pub fn error(&self) -> ErrorCode {
        self.error
    }

    /// Returns the detail string of the latched error, empty otherwise.
    pub fn error_detail(&self) -> &str {
        &self.error_detail
    }

    /// Emits the frame-start event once the header is complete and selects
    /// the payload state.
    fn begin_frame_payload(&mut self, visitor: &mut dyn FrameVisitor) -> bool {
        let lengths = FrameLengths::new(
            self.current_type_field_length + self.current_length_field_length,
            self.current_frame_length,
        );
        let continue_processing = match self.current_frame_type {
            DATA_FRAME_TYPE => visitor.on_data_frame_start(lengths),
            HEADERS_FRAME_TYPE => visitor.on_headers_frame_start(lengths),
            PRIORITY_FRAME_TYPE => visitor.on_priority_frame_start(lengths),
            SETTINGS_FRAME_TYPE => visitor.on_settings_frame_start(lengths),
            _ => true,
        };
        if self.current_frame_type == PUSH_PROMISE_FRAME_TYPE && self.current_frame_length == 0 {
            self.raise_error(visitor, ErrorCode::InternalError, "Unable to read push_id");
            return false;
        }
        self.state = if self.remaining_frame_length == 0 {
            DecoderState::FinishParsing
        } else {
            DecoderState::ReadingFramePayload
        };
        continue_processing
    }

    /// Routes available payload bytes down the stream, buffer or discard
    /// path of the current frame type.
    fn read_frame_payload(
        &mut self,
        visitor: &mut dyn FrameVisitor,
        bytes: &mut ReadableBytes<'_>,
    ) -> bool {
        let mut continue_processing = true;
        match self.current_frame_type {
            DATA_FRAME_TYPE => {
                let payload = self.take_payload(bytes);
                if !payload.is_empty() {
                    continue_processing = visitor.on_data_frame_payload(payload);
                }
            }
            HEADERS_FRAME_TYPE => {
                let payload = self.take_payload(bytes);
                if !payload.is_empty() {
                    continue_processing = visitor.on_headers_frame_payload(payload);
                }
            }
            PUSH_PROMISE_FRAME_TYPE => {
                if self.push_id_read {
                    let payload = self.take_payload(bytes);
                    if !payload.is_empty() {
                        continue_processing = visitor.on_push_promise_frame_payload(payload);
                    }
                } else {
                    continue_processing = self.read_push_id(visitor, bytes);
                }
            }
            CANCEL_PUSH_FRAME_TYPE | SETTINGS_FRAME_TYPE | PRIORITY_FRAME_TYPE
            | GOAWAY_FRAME_TYPE | MAX_PUSH_ID_FRAME_TYPE | DUPLICATE_PUSH_FRAME_TYPE => {
                self.buffer_frame_payload(bytes);
            }
            _ => {
                self.discard_frame_payload(bytes);
            }
        }
        if self.state == DecoderState::Error {
            return false;
        }
        if self.remaining_frame_length == 0 {
            self.state = DecoderState::FinishParsing;
        }
        continue_processing
    }

    /// Reads the PUSH_PROMISE push id from the payload, buffering partial
    /// varint bytes across calls. The id bytes count against the declared
    /// payload length.
    fn read_push_id(&mut self, visitor: &mut dyn FrameVisitor, bytes: &mut ReadableBytes<'_>) -> bool {
        if self.push_id_field.is_empty() {
            let Ok(first) = bytes.peek_u8() else {
                return true;
            };
            if parse_varint_len(first) as u64 > self.remaining_frame_length {
                self.raise_error(visitor, ErrorCode::InternalError, "Unable to read push_id");
                return false;
            }
        }
        match self.push_id_field.feed(bytes) {
            Some(push_id) => {
                self.remaining_frame_length -= self.push_id_field.wire_len() as u64;
                self.push_id_field.reset();
                self.push_id_read = true;
                visitor.on_push_promise_frame_start(push_id)
            }
            None => true,
        }
    }

    /// Emits the completion event of the current frame, parsing buffered
    /// payload for structured frames, then resets for the next frame.
    fn finish_parsing(&mut self, visitor: &mut dyn FrameVisitor) -> bool {
        let continue_processing = match self.current_frame_type {
            DATA_FRAME_TYPE => visitor.on_data_frame_end(),
            HEADERS_FRAME_TYPE => visitor.on_headers_frame_end(),
            PUSH_PROMISE_FRAME_TYPE => visitor.on_push_promise_frame_end(),
            PRIORITY_FRAME_TYPE => match parse_priority_frame(&self.buffer) {
                Ok(frame) => visitor.on_priority_frame(&frame),
                Err(detail) => {
                    self.raise_error(visitor, ErrorCode::InternalError, detail);
                    return false;
                }
            },
            SETTINGS_FRAME_TYPE => match parse_settings_frame(&self.buffer) {
                Ok(frame) => visitor.on_settings_frame(&frame),
                Err(detail) => {
                    self.raise_error(visitor, ErrorCode::InternalError, detail);
                    return false;
                }
            },
            CANCEL_PUSH_FRAME_TYPE => {
                match parse_varint_payload(&self.buffer, "Unable to read CANCEL_PUSH push_id") {
                    Ok(push_id) => visitor.on_cancel_push_frame(&CancelPushFrame { push_id }),
                    Err(detail) => {
                        self.raise_error(visitor, ErrorCode::InternalError, detail);
                        return false;
                    }
                }
            }
            GOAWAY_FRAME_TYPE => {
                match parse_varint_payload(&self.buffer, "Unable to read GOAWAY stream_id") {
                    Ok(stream_id) => visitor.on_goaway_frame(&GoAwayFrame { stream_id }),
                    Err(detail) => {
                        self.raise_error(visitor, ErrorCode::InternalError, detail);
                        return false;
                    }
                }
            }
            MAX_PUSH_ID_FRAME_TYPE => {
                match parse_varint_payload(&self.buffer, "Unable to read MAX_PUSH_ID push_id") {
                    Ok(push_id) => visitor.on_max_push_id_frame(&MaxPushIdFrame { push_id }),
                    Err(detail) => {
                        self.raise_error(visitor, ErrorCode::InternalError, detail);
                        return false;
                    }
                }
            }
            DUPLICATE_PUSH_FRAME_TYPE => {
                match parse_varint_payload(&self.buffer, "Unable to read DUPLICATE_PUSH push_id") {
                    Ok(push_id) => visitor.on_duplicate_push_frame(&DuplicatePushFrame { push_id }),
                    Err(detail) => {
                        self.raise_error(visitor, ErrorCode::InternalError, detail);
                        return false;
                    }
                }
            }
            // Unknown and reserved frames are discarded without callbacks.
            _ => true,
        };
        self.reset_frame();
        continue_processing
    }

    fn take_payload<'a>(&mut self, bytes: &mut ReadableBytes<'a>) -> &'a [u8] {
        let take = min(self.remaining_frame_length, bytes.cap() as u64) as usize;
        self.remaining_frame_length -= take as u64;
        bytes.take(take)
    }

    fn buffer_frame_payload(&mut self, bytes: &mut ReadableBytes<'_>) {
        let take = min(self.remaining_frame_length, bytes.cap() as u64) as usize;
        self.buffer.extend_from_slice(bytes.take(take));
        self.remaining_frame_length -= take as u64;
    }

    fn discard_frame_payload(&mut self, bytes: &mut ReadableBytes<'_>) {
        let take = min(self.remaining_frame_length, bytes.cap() as u64) as usize;
        bytes.take(take);
        self.remaining_frame_length -= take as u64;
    }

    fn reset_frame(&mut self) {
        self.current_frame_type = 0;
        self.current_type_field_length = 0;
        self.current_length_field_length = 0;
        self.current_frame_length = 0;
        self.remaining_frame_length = 0;
        self.push_id_read = false;
        self.buffer.clear();
        self.state = DecoderState::ReadingFrameType;
    }

    fn max_frame_length(&self) -> u64 {
        match self.current_frame_type {
            PRIORITY_FRAME_TYPE => MAX_PRIORITY_FRAME_LENGTH,
            CANCEL_PUSH_FRAME_TYPE | GOAWAY_FRAME_TYPE | MAX_PUSH_ID_FRAME_TYPE
            | DUPLICATE_PUSH_FRAME_TYPE => MAX_VARINT_FRAME_LENGTH,
            SETTINGS_FRAME_TYPE => MAX_SETTINGS_FRAME_LENGTH,
            _ => u64::MAX,
        }
    }

    fn raise_error(&mut self, visitor: &mut dyn FrameVisitor, error: ErrorCode, detail: &str) {
        self.state = DecoderState::Error;
        self.error = error;
        self.error_detail = detail.to_string();
        tracing::warn!(code = %error, detail, "http3 frame decoder error");
        visitor.on_error(error, detail);
    }
}

fn parse_priority_frame(payload: &[u8]) -> Result<PriorityFrame, &'static str> {
    let mut bytes = ReadableBytes::from(payload);
    let flags = bytes
        .poll_u8()
        .map_err(|_| "Unable to read PRIORITY frame flags")?;
    let mut frame = PriorityFrame {
        prioritized_type: PriorityElementType::from_bits(flags >> 6),
        dependency_type: PriorityElementType::from_bits((flags >> 4) & 0x3),
        exclusive: flags & 0x01 != 0,
        ..PriorityFrame::default()
    };
    if frame.prioritized_type != PriorityElementType::RootOfTree {
        frame.prioritized_element_id = bytes
            .get_varint()
            .map_err(|_| "Unable to read prioritized_element_id")?;
    }
    if frame.dependency_type != PriorityElementType::RootOfTree {
        frame.element_dependency_id = bytes
            .get_varint()
            .map_err(|_| "Unable to read element_dependency_id")?;
    }
    frame.weight = bytes
        .poll_u8()
        .map_err(|_| "Unable to read PRIORITY frame weight")?;
    if bytes.cap() != 0 {
        return Err("Superfluous data in PRIORITY frame");
    }
    Ok(frame)
}

fn parse_settings_frame(payload: &[u8]) -> Result<SettingsFrame, &'static str> {
    let mut bytes = ReadableBytes::from(payload);
    let mut frame = SettingsFrame::default();
    while bytes.cap() > 0 {
        let identifier = bytes
            .get_varint()
            .map_err(|_| "Unable to read settings frame identifier")?;
        let value = bytes
            .get_varint()
            .map_err(|_| "Unable to read settings frame content")?;
        frame.values.insert(identifier, value);
    }
    Ok(frame)
}

fn parse_varint_payload(payload: &[u8], detail: &'static str) -> Result<u64, &'static str> {
    let mut bytes = ReadableBytes::from(payload);
    bytes.get_varint().map_err(|_| detail)
}
