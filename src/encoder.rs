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

//! Serialization of outbound HTTP/3 frames.
//!
//! For the streamed frame types (DATA, HEADERS) only the frame header is
//! produced and the caller puts the payload on the wire directly; the
//! structured frames are serialized whole. All length fields use the
//! minimal variable-length encoding. Each function appends to `dst` and
//! returns the number of bytes written.

use crate::frame::{
    PriorityElementType, PriorityFrame, SettingsFrame, CANCEL_PUSH_FRAME_TYPE, DATA_FRAME_TYPE,
    DUPLICATE_PUSH_FRAME_TYPE, GOAWAY_FRAME_TYPE, HEADERS_FRAME_TYPE, MAX_PUSH_ID_FRAME_TYPE,
    PRIORITY_FRAME_TYPE, PUSH_PROMISE_FRAME_TYPE, SETTINGS_FRAME_TYPE,
};
use crate::octets::{put_varint, varint_len};

/// Serializes the header of a DATA frame; the payload travels separately.
pub fn serialize_data_frame_header(payload_length: u64, dst: &mut Vec<u8>) -> usize {
    serialize_frame_header(DATA_FRAME_TYPE, payload_length, dst)
}

/// Serializes the header of a HEADERS frame; the encoded header block
/// travels separately.
pub fn serialize_headers_frame_header(payload_length: u64, dst: &mut Vec<u8>) -> usize {
    serialize_frame_header(HEADERS_FRAME_TYPE, payload_length, dst)
}

/// Serializes a complete SETTINGS frame, entries in ascending identifier
/// order.
pub fn serialize_settings_frame(frame: &SettingsFrame, dst: &mut Vec<u8>) -> usize {
    let start = dst.len();
    put_varint(SETTINGS_FRAME_TYPE, dst);
    let mut payload_length = 0;
    for (&identifier, &value) in &frame.values {
        payload_length += varint_len(identifier) + varint_len(value);
    }
    put_varint(payload_length as u64, dst);
    for (&identifier, &value) in &frame.values {
        put_varint(identifier, dst);
        put_varint(value, dst);
    }
    dst.len() - start
}

/// Serializes a complete PRIORITY frame.
///
/// The first payload byte packs the two element types and the exclusive
/// flag; an element id is emitted only when its type is not
/// [`PriorityElementType::RootOfTree`].
pub fn serialize_priority_frame(frame: &PriorityFrame, dst: &mut Vec<u8>) -> usize {
    let start = dst.len();
    put_varint(PRIORITY_FRAME_TYPE, dst);
    // Flags byte plus weight byte.
    let mut payload_length = 2;
    if frame.prioritized_type != PriorityElementType::RootOfTree {
        payload_length += varint_len(frame.prioritized_element_id);
    }
    if frame.dependency_type != PriorityElementType::RootOfTree {
        payload_length += varint_len(frame.element_dependency_id);
    }
    put_varint(payload_length as u64, dst);
    let flags = (frame.prioritized_type.to_bits() << 6)
        | (frame.dependency_type.to_bits() << 4)
        | u8::from(frame.exclusive);
    dst.push(flags);
    if frame.prioritized_type != PriorityElementType::RootOfTree {
        put_varint(frame.prioritized_element_id, dst);
    }
    if frame.dependency_type != PriorityElementType::RootOfTree {
        put_varint(frame.element_dependency_id, dst);
    }
    dst.push(frame.weight);
    dst.len() - start
}

/// Serializes a complete CANCEL_PUSH frame.
pub fn serialize_cancel_push_frame(push_id: u64, dst: &mut Vec<u8>) -> usize {
    serialize_varint_frame(CANCEL_PUSH_FRAME_TYPE, push_id, dst)
}

/// Serializes a complete GOAWAY frame.
pub fn serialize_goaway_frame(stream_id: u64, dst: &mut Vec<u8>) -> usize {
    serialize_varint_frame(GOAWAY_FRAME_TYPE, stream_id, dst)
}

/// Serializes a complete MAX_PUSH_ID frame.
pub fn serialize_max_push_id_frame(push_id: u64, dst: &mut Vec<u8>) -> usize {
    serialize_varint_frame(MAX_PUSH_ID_FRAME_TYPE, push_id, dst)
}

/// Serializes a complete DUPLICATE_PUSH frame.
pub fn serialize_duplicate_push_frame(push_id: u64, dst: &mut Vec<u8>) -> usize {
    serialize_varint_frame(DUPLICATE_PUSH_FRAME_TYPE, push_id, dst)
}

/// Serializes a PUSH_PROMISE frame up to and including the push id. The
/// declared length covers `header_block_length` bytes the caller sends
/// after this header.
pub fn serialize_push_promise_frame_with_only_push_id(
    push_id: u64,
    header_block_length: u64,
    dst: &mut Vec<u8>,
) -> usize {
    let start = dst.len();
    put_varint(PUSH_PROMISE_FRAME_TYPE, dst);
    put_varint(varint_len(push_id) as u64 + header_block_length, dst);
    put_varint(push_id, dst);
    dst.len() - start
}

fn serialize_frame_header(frame_type: u64, payload_length: u64, dst: &mut Vec<u8>) -> usize {
    let start = dst.len();
    put_varint(frame_type, dst);
    put_varint(payload_length, dst);
    dst.len() - start
}

fn serialize_varint_frame(frame_type: u64, value: u64, dst: &mut Vec<u8>) -> usize {
    let start = dst.len();
    put_varint(frame_type, dst);
    put_varint(varint_len(value) as u64, dst);
    put_varint(value, dst);
    dst.len() - start
}
