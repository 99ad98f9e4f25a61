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

//! Write-only unidirectional stream carrying QPACK instructions.

use crate::control::{CloseBehavior, Connection};
use crate::error::ErrorCode;
use crate::octets::put_varint;
use crate::qpack::sender::StreamSenderDelegate;

/// Write half of a unidirectional QUIC stream.
pub trait WriteStream {
    /// Writes `data`, buffering whatever flow control does not yet permit.
    fn write_or_buffer_data(&mut self, data: &[u8]);
}

/// QPACK encoder or decoder stream on the send side.
///
/// The first payload write is preceded by a one-time variable-length
/// stream type that marks the stream's role; the value is treated
/// opaquely. Subsequent writes append directly. The stream is critical: a
/// transport-level reset closes the connection.
pub struct QpackSendStream<W: WriteStream> {
    stream: W,
    stream_type: u64,
    stream_type_sent: bool,
}

impl<W: WriteStream> QpackSendStream<W> {
    pub fn new(stream: W, stream_type: u64) -> Self {
        QpackSendStream {
            stream,
            stream_type,
            stream_type_sent: false,
        }
    }

    /// Writes instruction bytes, sending the stream type first if it has
    /// not been sent yet.
    pub fn write_stream_data(&mut self, data: &[u8]) {
        if !self.stream_type_sent {
            let mut stream_type = Vec::with_capacity(8);
            put_varint(self.stream_type, &mut stream_type);
            self.stream.write_or_buffer_data(&stream_type);
            self.stream_type_sent = true;
        }
        self.stream.write_or_buffer_data(data);
    }

    /// Handles a transport-level reset, which is not allowed on a critical
    /// stream.
    pub fn on_stream_reset(&mut self, connection: &mut dyn Connection) {
        connection.close(
            ErrorCode::InvalidStreamId,
            "Attempt to reset qpack send stream",
            CloseBehavior::SendClosePacket,
        );
    }

    pub fn stream_mut(&mut self) -> &mut W {
        &mut self.stream
    }
}

impl<W: WriteStream> StreamSenderDelegate for QpackSendStream<W> {
    fn write_stream_data(&mut self, data: &[u8]) {
        QpackSendStream::write_stream_data(self, data);
    }
}
