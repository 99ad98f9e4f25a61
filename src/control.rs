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

//! Receive side of the HTTP/3 control stream.
//!
//! [`ReceiveControlStream`] drives a [`FrameDecoder`] from a unidirectional
//! QUIC stream of type "control", enforces which frame types are legal
//! there, and translates the permitted frames into session actions: peer
//! SETTINGS are applied once, PRIORITY frames are applied when the local
//! endpoint is a server, and everything else closes the connection. The
//! control stream is critical; resetting it is unrecoverable.

use tracing::debug;

use crate::decoder::{FrameDecoder, FrameVisitor};
use crate::error::ErrorCode;
use crate::frame::{
    CancelPushFrame, DuplicatePushFrame, FrameLengths, GoAwayFrame, MaxPushIdFrame, PriorityFrame,
    SettingsFrame, SETTINGS_MAX_HEADER_LIST_SIZE, SETTINGS_NUM_PLACEHOLDERS,
};

/// Whether the local endpoint acts as a client or a server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Perspective {
    Client,
    Server,
}

/// How a connection close is signalled to the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseBehavior {
    /// Send a connection close packet to the peer.
    SendClosePacket,
    /// Tear the connection down without notifying the peer.
    SilentClose,
}

/// Connection-level capabilities the coordinator needs from the transport.
pub trait Connection {
    /// Closes the connection with an error code and a detail string.
    fn close(&mut self, code: ErrorCode, detail: &str, behavior: CloseBehavior);

    /// Returns whether the connection is still alive.
    fn connected(&self) -> bool;
}

/// A stream whose priority can be set from a PRIORITY frame.
pub trait PriorityStream {
    fn set_priority(&mut self, weight: u8);
}

/// Session surface consumed by the control-stream coordinator.
pub trait Session {
    /// Returns whether the local endpoint is a client or a server.
    fn perspective(&self) -> Perspective;

    /// Returns the underlying connection.
    fn connection(&mut self) -> &mut dyn Connection;

    /// Looks up or creates the stream with the given id. Returns `None`
    /// when the stream cannot exist, for example because the peer is not
    /// permitted to open it.
    fn get_or_create_stream(&mut self, stream_id: u64) -> Option<&mut dyn PriorityStream>;

    /// Caps the header list size of outbound responses.
    fn set_max_outbound_header_list_size(&mut self, size: u64);
}

/// Receive buffer of one QUIC stream, exposing contiguous regions beyond
/// the consumed prefix.
pub trait StreamSequencer {
    /// Returns the contiguous readable region starting at `offset`, or
    /// `None` when no byte at that offset has arrived yet.
    fn peek_region(&self, offset: u64) -> Option<&[u8]>;

    /// Releases `count` bytes of flow control from the front of the stream.
    fn mark_consumed(&mut self, count: u64);

    /// Returns how many bytes have been consumed so far.
    fn num_bytes_consumed(&self) -> u64;
}

/// Coordinator for the peer's control stream.
///
/// Owns the frame decoder and an offset into the sequencer; bytes are
/// peeked (not consumed) so that flow control is released only once a
/// frame has been fully applied to the session.
pub struct ReceiveControlStream {
    decoder: FrameDecoder,
    sequencer_offset: u64,
    received_settings_length: u64,
    current_priority_length: u64,
    reading_stopped: bool,
}

impl ReceiveControlStream {
    /// Creates a coordinator positioned at the sequencer's current consumed
    /// offset.
    pub fn new(sequencer: &dyn StreamSequencer) -> Self {
        ReceiveControlStream {
            decoder: FrameDecoder::new(),
            sequencer_offset: sequencer.num_bytes_consumed(),
            received_settings_length: 0,
            current_priority_length: 0,
            reading_stopped: false,
        }
    }

    /// Stops the read loop permanently.
    pub fn stop_reading(&mut self) {
        self.reading_stopped = true;
    }

    /// Handles a transport-level reset of the control stream, which is not
    /// allowed on a critical stream.
    pub fn on_stream_reset(&mut self, session: &mut dyn Session) {
        session.connection().close(
            ErrorCode::InvalidStreamId,
            "Attempt to reset receive control stream",
            CloseBehavior::SendClosePacket,
        );
    }

    /// Feeds newly arrived stream bytes through the decoder.
    ///
    /// Loops while the connection is alive, reading has not been stopped
    /// and the decoder has not latched an error; each round peeks the next
    /// contiguous region and advances by however many bytes the decoder
    /// consumed. Session mutations happen synchronously inside the visitor
    /// callbacks; flow-control consumption recorded by the callbacks is
    /// applied to the sequencer after each `process_input` round.
    pub fn on_data_available(
        &mut self,
        session: &mut dyn Session,
        sequencer: &mut dyn StreamSequencer,
    ) {
        loop {
            if !session.connection().connected()
                || self.reading_stopped
                || self.decoder.error() != ErrorCode::NoError
            {
                break;
            }
            debug_assert!(self.sequencer_offset >= sequencer.num_bytes_consumed());
            let mut pending_consumed = 0;
            let processed = {
                let Some(region) = sequencer.peek_region(self.sequencer_offset) else {
                    break;
                };
                let mut visitor = ControlFrameVisitor {
                    session: &mut *session,
                    received_settings_length: &mut self.received_settings_length,
                    current_priority_length: &mut self.current_priority_length,
                    pending_consumed: &mut pending_consumed,
                };
                self.decoder.process_input(&mut visitor, region)
            };
            self.sequencer_offset += processed as u64;
            if pending_consumed > 0 {
                sequencer.mark_consumed(pending_consumed);
            }
            if processed == 0 {
                break;
            }
        }
    }
}

/// Decoder visitor that applies permitted frames to the session and closes
/// the connection on everything else.
struct ControlFrameVisitor<'a> {
    session: &'a mut dyn Session,
    received_settings_length: &'a mut u64,
    current_priority_length: &'a mut u64,
    pending_consumed: &'a mut u64,
}

impl ControlFrameVisitor<'_> {
    fn close_on_wrong_frame(&mut self, frame_type: &str) {
        self.session.connection().close(
            ErrorCode::HttpDecoderError,
            &format!("{frame_type} frame received on control stream"),
            CloseBehavior::SendClosePacket,
        );
    }

    fn close_on_client_priority(&mut self) -> bool {
        if self.session.perspective() == Perspective::Client {
            self.session.connection().close(
                ErrorCode::HttpDecoderError,
                "Server must not send Priority frames.",
                CloseBehavior::SendClosePacket,
            );
            return true;
        }
        false
    }
}

impl FrameVisitor for ControlFrameVisitor<'_> {
    fn on_error(&mut self, _error: ErrorCode, _detail: &str) {
        self.session.connection().close(
            ErrorCode::HttpDecoderError,
            "Http decoder internal error",
            CloseBehavior::SendClosePacket,
        );
    }

    fn on_priority_frame_start(&mut self, lengths: FrameLengths) -> bool {
        if self.close_on_client_priority() {
            return false;
        }
        debug_assert_eq!(0, *self.current_priority_length);
        *self.current_priority_length = lengths.header_length + lengths.payload_length;
        true
    }

    fn on_priority_frame(&mut self, frame: &PriorityFrame) -> bool {
        if self.close_on_client_priority() {
            return false;
        }
        match self.session.get_or_create_stream(frame.prioritized_element_id) {
            Some(stream) => {
                stream.set_priority(frame.weight);
                debug!(
                    stream_id = frame.prioritized_element_id,
                    weight = frame.weight,
                    "applied priority from control stream"
                );
            }
            // The client may reference a stream the server will not open;
            // the frame is dropped.
            None => {
                debug!(
                    stream_id = frame.prioritized_element_id,
                    "dropped priority for unavailable stream"
                );
            }
        }
        *self.pending_consumed += *self.current_priority_length;
        *self.current_priority_length = 0;
        true
    }

    fn on_cancel_push_frame(&mut self, _frame: &CancelPushFrame) -> bool {
        self.close_on_wrong_frame("Cancel Push");
        false
    }

    fn on_max_push_id_frame(&mut self, _frame: &MaxPushIdFrame) -> bool {
        self.close_on_wrong_frame("Max Push Id");
        false
    }

    fn on_goaway_frame(&mut self, _frame: &GoAwayFrame) -> bool {
        self.close_on_wrong_frame("Goaway");
        false
    }

    fn on_settings_frame_start(&mut self, lengths: FrameLengths) -> bool {
        if *self.received_settings_length != 0 {
            self.session.connection().close(
                ErrorCode::InvalidStreamId,
                "Settings frames are received twice.",
                CloseBehavior::SendClosePacket,
            );
            return false;
        }
        *self.received_settings_length = lengths.header_length + lengths.payload_length;
        true
    }

    fn on_settings_frame(&mut self, frame: &SettingsFrame) -> bool {
        debug!(
            entries = frame.values.len(),
            "control stream received settings frame"
        );
        for (&identifier, &value) in &frame.values {
            match identifier {
                SETTINGS_MAX_HEADER_LIST_SIZE => {
                    self.session.set_max_outbound_header_list_size(value);
                }
                // Retained in the frame; no session action yet.
                SETTINGS_NUM_PLACEHOLDERS => {}
                _ => {}
            }
        }
        *self.pending_consumed += *self.received_settings_length;
        true
    }

    fn on_duplicate_push_frame(&mut self, _frame: &DuplicatePushFrame) -> bool {
        self.close_on_wrong_frame("Duplicate Push");
        false
    }

    fn on_data_frame_start(&mut self, _lengths: FrameLengths) -> bool {
        self.close_on_wrong_frame("Data");
        false
    }

    fn on_data_frame_payload(&mut self, _payload: &[u8]) -> bool {
        self.close_on_wrong_frame("Data");
        false
    }

    fn on_data_frame_end(&mut self) -> bool {
        self.close_on_wrong_frame("Data");
        false
    }

    fn on_headers_frame_start(&mut self, _lengths: FrameLengths) -> bool {
        self.close_on_wrong_frame("Headers");
        false
    }

    fn on_headers_frame_payload(&mut self, _payload: &[u8]) -> bool {
        self.close_on_wrong_frame("Headers");
        false
    }

    fn on_headers_frame_end(&mut self) -> bool {
        self.close_on_wrong_frame("Headers");
        false
    }

    fn on_push_promise_frame_start(&mut self, _push_id: u64) -> bool {
        self.close_on_wrong_frame("Push Promise");
        false
    }

    fn on_push_promise_frame_payload(&mut self, _payload: &[u8]) -> bool {
        self.close_on_wrong_frame("Push Promise");
        false
    }

    fn on_push_promise_frame_end(&mut self) -> bool {
        self.close_on_wrong_frame("Push Promise");
        false
    }
}

#[cfg(test)]
mod h3_control {
    use std::collections::HashMap;

    use crate::control::{
        CloseBehavior, Connection, Perspective, PriorityStream, ReceiveControlStream, Session,
        StreamSequencer,
    };
    use crate::encoder::{serialize_priority_frame, serialize_settings_frame};
    use crate::error::ErrorCode;
    use crate::frame::{PriorityElementType, PriorityFrame, SettingsFrame};

    #[derive(Default)]
    struct MockConnection {
        closed: Option<(ErrorCode, String)>,
    }

    impl Connection for MockConnection {
        fn close(&mut self, code: ErrorCode, detail: &str, _behavior: CloseBehavior) {
            if self.closed.is_none() {
                self.closed = Some((code, detail.to_string()));
            }
        }

        fn connected(&self) -> bool {
            self.closed.is_none()
        }
    }

    #[derive(Default)]
    struct MockStream {
        priority: Option<u8>,
    }

    impl PriorityStream for MockStream {
        fn set_priority(&mut self, weight: u8) {
            self.priority = Some(weight);
        }
    }

    struct MockSession {
        perspective: Perspective,
        connection: MockConnection,
        streams: HashMap<u64, MockStream>,
        accept_new_streams: bool,
        max_outbound_header_list_size: Option<u64>,
    }

    impl MockSession {
        fn new(perspective: Perspective) -> Self {
            MockSession {
                perspective,
                connection: MockConnection::default(),
                streams: HashMap::new(),
                accept_new_streams: true,
                max_outbound_header_list_size: None,
            }
        }
    }

    impl Session for MockSession {
        fn perspective(&self) -> Perspective {
            self.perspective
        }

        fn connection(&mut self) -> &mut dyn Connection {
            &mut self.connection
        }

        fn get_or_create_stream(&mut self, stream_id: u64) -> Option<&mut dyn PriorityStream> {
            if !self.accept_new_streams && !self.streams.contains_key(&stream_id) {
                return None;
            }
            let stream: &mut dyn PriorityStream = self.streams.entry(stream_id).or_default();
            Some(stream)
        }

        fn set_max_outbound_header_list_size(&mut self, size: u64) {
            self.max_outbound_header_list_size = Some(size);
        }
    }

    #[derive(Default)]
    struct MockSequencer {
        data: Vec<u8>,
        consumed: u64,
    }

    impl StreamSequencer for MockSequencer {
        fn peek_region(&self, offset: u64) -> Option<&[u8]> {
            let offset = offset as usize;
            if offset < self.data.len() {
                Some(&self.data[offset..])
            } else {
                None
            }
        }

        fn mark_consumed(&mut self, count: u64) {
            self.consumed += count;
        }

        fn num_bytes_consumed(&self) -> u64 {
            self.consumed
        }
    }

    fn settings_bytes() -> Vec<u8> {
        let mut frame = SettingsFrame::default();
        frame.values.insert(3, 2);
        frame.values.insert(6, 5);
        let mut buf = Vec::new();
        serialize_settings_frame(&frame, &mut buf);
        buf
    }

    /// UT test cases for applying a SETTINGS frame from the peer.
    ///
    /// # Brief
    /// 1. Feeds a SETTINGS frame with MAX_HEADER_LIST_SIZE through the
    ///    coordinator, split across two delivery rounds.
    /// 2. Checks that the session cap is set and the whole frame length is
    ///    marked consumed.
    #[test]
    fn ut_receive_settings() {
        let mut session = MockSession::new(Perspective::Server);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);

        let bytes = settings_bytes();
        sequencer.data.extend_from_slice(&bytes[..3]);
        stream.on_data_available(&mut session, &mut sequencer);
        assert!(session.connection.connected());
        assert_eq!(session.max_outbound_header_list_size, None);

        sequencer.data.extend_from_slice(&bytes[3..]);
        stream.on_data_available(&mut session, &mut sequencer);
        assert!(session.connection.connected());
        assert_eq!(session.max_outbound_header_list_size, Some(5));
        assert_eq!(sequencer.consumed, bytes.len() as u64);
    }

    /// UT test cases for the SETTINGS single-shot rule.
    ///
    /// # Brief
    /// 1. Feeds two SETTINGS frames on the same control stream.
    /// 2. Checks that the connection closes with the exact detail and that
    ///    consumption stops at the second frame's header.
    #[test]
    fn ut_receive_settings_twice() {
        let mut session = MockSession::new(Perspective::Server);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);

        let bytes = settings_bytes();
        sequencer.data.extend_from_slice(&bytes);
        sequencer.data.extend_from_slice(&bytes);
        stream.on_data_available(&mut session, &mut sequencer);
        assert_eq!(
            session.connection.closed,
            Some((
                ErrorCode::InvalidStreamId,
                "Settings frames are received twice.".to_string()
            ))
        );
        // Only the first frame was released to flow control.
        assert_eq!(sequencer.consumed, bytes.len() as u64);
    }

    /// UT test cases for PRIORITY applied on a server.
    ///
    /// # Brief
    /// 1. Feeds a PRIORITY frame naming stream 4 to a server session.
    /// 2. Checks that the stream priority becomes the frame weight and the
    ///    frame length is marked consumed.
    #[test]
    fn ut_priority_on_server() {
        let mut session = MockSession::new(Perspective::Server);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);

        let frame = PriorityFrame {
            prioritized_type: PriorityElementType::RequestStream,
            dependency_type: PriorityElementType::RootOfTree,
            exclusive: false,
            prioritized_element_id: 4,
            weight: 0x7F,
            ..PriorityFrame::default()
        };
        serialize_priority_frame(&frame, &mut sequencer.data);
        let frame_len = sequencer.data.len() as u64;
        stream.on_data_available(&mut session, &mut sequencer);
        assert!(session.connection.connected());
        assert_eq!(session.streams[&4].priority, Some(0x7F));
        assert_eq!(sequencer.consumed, frame_len);
    }

    /// UT test cases for PRIORITY naming an unavailable stream.
    ///
    /// # Brief
    /// 1. Configures the server session to reject stream creation.
    /// 2. Feeds a PRIORITY frame naming an unopened stream.
    /// 3. Checks that the frame is dropped without closing the connection.
    #[test]
    fn ut_priority_unknown_stream() {
        let mut session = MockSession::new(Perspective::Server);
        session.accept_new_streams = false;
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);

        let frame = PriorityFrame {
            prioritized_element_id: 12,
            weight: 3,
            ..PriorityFrame::default()
        };
        serialize_priority_frame(&frame, &mut sequencer.data);
        let frame_len = sequencer.data.len() as u64;
        stream.on_data_available(&mut session, &mut sequencer);
        assert!(session.connection.connected());
        assert!(session.streams.is_empty());
        assert_eq!(sequencer.consumed, frame_len);
    }

    /// UT test cases for PRIORITY received by a client.
    ///
    /// # Brief
    /// 1. Feeds a PRIORITY frame to a client session.
    /// 2. Checks that the connection closes with the server-priority
    ///    detail.
    #[test]
    fn ut_priority_on_client() {
        let mut session = MockSession::new(Perspective::Client);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);

        serialize_priority_frame(&PriorityFrame::default(), &mut sequencer.data);
        stream.on_data_available(&mut session, &mut sequencer);
        assert_eq!(
            session.connection.closed,
            Some((
                ErrorCode::HttpDecoderError,
                "Server must not send Priority frames.".to_string()
            ))
        );
    }

    /// UT test cases for frames that are illegal on the control stream.
    ///
    /// # Brief
    /// 1. Feeds DATA and GOAWAY frames on the control stream.
    /// 2. Checks the wrong-frame close detail for each.
    #[test]
    fn ut_wrong_frame_on_control_stream() {
        let mut session = MockSession::new(Perspective::Server);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);
        sequencer.data.extend_from_slice(b"\x00\x05Data!");
        stream.on_data_available(&mut session, &mut sequencer);
        assert_eq!(
            session.connection.closed,
            Some((
                ErrorCode::HttpDecoderError,
                "Data frame received on control stream".to_string()
            ))
        );

        let mut session = MockSession::new(Perspective::Server);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);
        sequencer.data.extend_from_slice(&[0x07, 0x01, 0x01]);
        stream.on_data_available(&mut session, &mut sequencer);
        assert_eq!(
            session.connection.closed,
            Some((
                ErrorCode::HttpDecoderError,
                "Goaway frame received on control stream".to_string()
            ))
        );
    }

    /// UT test cases for decoder errors reaching the session.
    ///
    /// # Brief
    /// 1. Feeds an oversized CANCEL_PUSH frame on the control stream.
    /// 2. Checks that the connection closes with the decoder-error detail
    ///    and that later data is ignored.
    #[test]
    fn ut_decoder_error_closes_connection() {
        let mut session = MockSession::new(Perspective::Server);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);
        sequencer.data.extend_from_slice(&[0x03, 0x10, 0x15]);
        stream.on_data_available(&mut session, &mut sequencer);
        assert_eq!(
            session.connection.closed,
            Some((
                ErrorCode::HttpDecoderError,
                "Http decoder internal error".to_string()
            ))
        );
    }

    /// UT test cases for resetting the control stream.
    ///
    /// # Brief
    /// 1. Signals a stream reset to the coordinator.
    /// 2. Checks the close code and detail.
    #[test]
    fn ut_stream_reset() {
        let mut session = MockSession::new(Perspective::Server);
        let sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);
        stream.on_stream_reset(&mut session);
        assert_eq!(
            session.connection.closed,
            Some((
                ErrorCode::InvalidStreamId,
                "Attempt to reset receive control stream".to_string()
            ))
        );
    }

    /// UT test cases for stopping the read loop.
    ///
    /// # Brief
    /// 1. Stops reading before data arrives.
    /// 2. Checks that available bytes are left untouched.
    #[test]
    fn ut_stop_reading() {
        let mut session = MockSession::new(Perspective::Server);
        let mut sequencer = MockSequencer::default();
        let mut stream = ReceiveControlStream::new(&sequencer);
        stream.stop_reading();
        sequencer.data.extend_from_slice(&settings_bytes());
        stream.on_data_available(&mut session, &mut sequencer);
        assert_eq!(sequencer.consumed, 0);
        assert_eq!(session.max_outbound_header_list_size, None);
    }
}
