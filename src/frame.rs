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

//! HTTP/3 frame types and structured frame payloads.
//!
//! Wire layout of every frame: `type:VARINT length:VARINT payload`.
//! DATA, HEADERS and the PUSH_PROMISE header block are streamed through the
//! decoder's payload callbacks; the frames defined here are the structured
//! ones whose payload is buffered and parsed whole.

use std::collections::BTreeMap;

/// DATA frame type code.
pub const DATA_FRAME_TYPE: u64 = 0x0;
/// HEADERS frame type code.
pub const HEADERS_FRAME_TYPE: u64 = 0x1;
/// PRIORITY frame type code.
pub const PRIORITY_FRAME_TYPE: u64 = 0x2;
/// CANCEL_PUSH frame type code.
pub const CANCEL_PUSH_FRAME_TYPE: u64 = 0x3;
/// SETTINGS frame type code.
pub const SETTINGS_FRAME_TYPE: u64 = 0x4;
/// PUSH_PROMISE frame type code.
pub const PUSH_PROMISE_FRAME_TYPE: u64 = 0x5;
/// GOAWAY frame type code.
pub const GOAWAY_FRAME_TYPE: u64 = 0x7;
/// MAX_PUSH_ID frame type code.
pub const MAX_PUSH_ID_FRAME_TYPE: u64 = 0xD;
/// DUPLICATE_PUSH frame type code.
pub const DUPLICATE_PUSH_FRAME_TYPE: u64 = 0xE;

/// SETTINGS_NUM_PLACEHOLDERS setting code.
pub const SETTINGS_NUM_PLACEHOLDERS: u64 = 0x3;
/// SETTINGS_MAX_HEADER_LIST_SIZE setting code.
pub const SETTINGS_MAX_HEADER_LIST_SIZE: u64 = 0x6;

/// Header and payload length of a frame, in bytes.
///
/// The header length covers the type and length varints. Surfaced in the
/// decoder's `*_frame_start` callbacks so consumers can account for wire
/// consumption without re-deriving varint widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLengths {
    /// Length of the frame header (type and length fields).
    pub header_length: u64,
    /// Declared length of the frame payload.
    pub payload_length: u64,
}

impl FrameLengths {
    /// Constructs a `FrameLengths` from header and payload byte counts.
    pub fn new(header_length: u64, payload_length: u64) -> Self {
        FrameLengths {
            header_length,
            payload_length,
        }
    }
}

/// Element kinds a PRIORITY frame can reference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityElementType {
    /// A request stream, named by its stream id.
    #[default]
    RequestStream = 0,
    /// A push stream, named by its push id.
    PushStream = 1,
    /// A placeholder in the priority tree.
    Placeholder = 2,
    /// The root of the priority tree; carries no element id.
    RootOfTree = 3,
}

impl PriorityElementType {
    pub(crate) fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => PriorityElementType::RequestStream,
            1 => PriorityElementType::PushStream,
            2 => PriorityElementType::Placeholder,
            _ => PriorityElementType::RootOfTree,
        }
    }

    pub(crate) fn to_bits(self) -> u8 {
        self as u8
    }
}

/// PRIORITY frame payload.
///
/// The first payload byte packs
/// `prioritized_type:2 | dependency_type:2 | empty:3 | exclusive:1`.
/// Each element id is present on the wire only when the matching type is
/// not [`PriorityElementType::RootOfTree`]; absent ids stay zero here.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PriorityFrame {
    /// Kind of the element being (re)prioritized.
    pub prioritized_type: PriorityElementType,
    /// Kind of the element depended on.
    pub dependency_type: PriorityElementType,
    /// Whether the dependency is exclusive.
    pub exclusive: bool,
    /// Id of the prioritized element.
    pub prioritized_element_id: u64,
    /// Id of the dependency element.
    pub element_dependency_id: u64,
    /// Priority weight.
    pub weight: u8,
}

/// SETTINGS frame payload.
///
/// Every identifier on the wire is preserved, including reserved and
/// unknown ones; only a recognized subset carries semantic effect for the
/// control stream. The map is ordered by identifier, which also makes
/// serialization deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingsFrame {
    /// Mapping from setting identifier to value.
    pub values: BTreeMap<u64, u64>,
}

/// CANCEL_PUSH frame payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancelPushFrame {
    /// Id of the push being cancelled.
    pub push_id: u64,
}

/// GOAWAY frame payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GoAwayFrame {
    /// Last stream id the sender will act on.
    pub stream_id: u64,
}

/// MAX_PUSH_ID frame payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxPushIdFrame {
    /// Largest push id the sender is willing to accept.
    pub push_id: u64,
}

/// DUPLICATE_PUSH frame payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DuplicatePushFrame {
    /// Id of the duplicated push.
    pub push_id: u64,
}
