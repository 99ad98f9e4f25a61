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

//! Per-instruction senders for the QPACK decoder and encoder streams.
//!
//! Each sender pairs an [`InstructionEncoder`] with a delegate that puts
//! the serialized bytes on the wire, typically a
//! [`crate::qpack::send_stream::QpackSendStream`].

use crate::qpack::encoder::InstructionEncoder;
use crate::qpack::{
    DUPLICATE_INSTRUCTION, HEADER_ACKNOWLEDGEMENT_INSTRUCTION,
    INSERT_COUNT_INCREMENT_INSTRUCTION, INSERT_WITHOUT_NAME_REFERENCE_INSTRUCTION,
    INSERT_WITH_NAME_REFERENCE_INSTRUCTION, SET_DYNAMIC_TABLE_CAPACITY_INSTRUCTION,
    STREAM_CANCELLATION_INSTRUCTION,
};

/// Receives serialized instruction bytes for transmission.
pub trait StreamSenderDelegate {
    fn write_stream_data(&mut self, data: &[u8]);
}

/// Serializes instructions for transmission on the decoder stream:
/// acknowledgements and cancellations flowing back to the peer's encoder.
pub struct DecoderStreamSender<D: StreamSenderDelegate> {
    delegate: D,
    instruction_encoder: InstructionEncoder,
}

impl<D: StreamSenderDelegate> DecoderStreamSender<D> {
    pub fn new(delegate: D) -> Self {
        Self {
            delegate,
            instruction_encoder: InstructionEncoder::new(),
        }
    }

    /// Signals that the known received count grew by `increment`.
    pub fn send_insert_count_increment(&mut self, increment: u64) {
        self.instruction_encoder.set_varint(increment);
        let mut output = Vec::new();
        self.instruction_encoder
            .encode(&INSERT_COUNT_INCREMENT_INSTRUCTION, &mut output);
        self.delegate.write_stream_data(&output);
    }

    /// Acknowledges the header block of `stream_id`.
    pub fn send_header_acknowledgement(&mut self, stream_id: u64) {
        self.instruction_encoder.set_varint(stream_id);
        let mut output = Vec::new();
        self.instruction_encoder
            .encode(&HEADER_ACKNOWLEDGEMENT_INSTRUCTION, &mut output);
        self.delegate.write_stream_data(&output);
    }

    /// Signals that `stream_id` was reset or abandoned.
    pub fn send_stream_cancellation(&mut self, stream_id: u64) {
        self.instruction_encoder.set_varint(stream_id);
        let mut output = Vec::new();
        self.instruction_encoder
            .encode(&STREAM_CANCELLATION_INSTRUCTION, &mut output);
        self.delegate.write_stream_data(&output);
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }
}

/// Serializes instructions for transmission on the encoder stream: dynamic
/// table mutations announced to the peer's decoder.
pub struct EncoderStreamSender<D: StreamSenderDelegate> {
    delegate: D,
    instruction_encoder: InstructionEncoder,
}

impl<D: StreamSenderDelegate> EncoderStreamSender<D> {
    pub fn new(delegate: D) -> Self {
        Self {
            delegate,
            instruction_encoder: InstructionEncoder::new(),
        }
    }

    /// Inserts an entry whose name is a table reference.
    pub fn send_insert_with_name_reference(
        &mut self,
        is_static: bool,
        name_index: u64,
        value: &[u8],
    ) {
        self.instruction_encoder.set_s_bit(is_static);
        self.instruction_encoder.set_varint(name_index);
        self.instruction_encoder.set_value(value);
        let mut output = Vec::new();
        self.instruction_encoder
            .encode(&INSERT_WITH_NAME_REFERENCE_INSTRUCTION, &mut output);
        self.delegate.write_stream_data(&output);
    }

    /// Inserts an entry with a literal name.
    pub fn send_insert_without_name_reference(&mut self, name: &[u8], value: &[u8]) {
        self.instruction_encoder.set_name(name);
        self.instruction_encoder.set_value(value);
        let mut output = Vec::new();
        self.instruction_encoder
            .encode(&INSERT_WITHOUT_NAME_REFERENCE_INSTRUCTION, &mut output);
        self.delegate.write_stream_data(&output);
    }

    /// Re-inserts the entry at `index`.
    pub fn send_duplicate(&mut self, index: u64) {
        self.instruction_encoder.set_varint(index);
        let mut output = Vec::new();
        self.instruction_encoder
            .encode(&DUPLICATE_INSTRUCTION, &mut output);
        self.delegate.write_stream_data(&output);
    }

    /// Announces a new dynamic table capacity.
    pub fn send_set_dynamic_table_capacity(&mut self, capacity: u64) {
        self.instruction_encoder.set_varint(capacity);
        let mut output = Vec::new();
        self.instruction_encoder
            .encode(&SET_DYNAMIC_TABLE_CAPACITY_INSTRUCTION, &mut output);
        self.delegate.write_stream_data(&output);
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }
}
