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

//! `h3wire` provides the HTTP/3 wire layer carried on QUIC byte streams.
//!
//! The crate contains the pieces that sit between a QUIC transport and the
//! HTTP semantics above it:
//!
//! - A reentrant streaming [`FrameDecoder`] that accepts arbitrarily
//!   fragmented input and reports frames through a pausable [`FrameVisitor`].
//! - A frame serializer ([`encoder`]) for outbound control and request
//!   frames.
//! - A [`ReceiveControlStream`] coordinator that enforces the per-stream
//!   frame policy of the HTTP/3 control stream and applies peer SETTINGS.
//! - The QPACK instruction serializer and send-stream wrapper ([`qpack`])
//!   for the decoder and encoder streams.
//!
//! The QUIC transport itself, request streams, QPACK decoding and the
//! dynamic table are out of scope; they interact with this crate through
//! the small traits in [`control`] and [`qpack`].

pub mod control;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
mod huffman;
pub mod octets;
pub mod qpack;

pub use control::{
    CloseBehavior, Connection, Perspective, PriorityStream, ReceiveControlStream, Session,
    StreamSequencer,
};
pub use decoder::{FrameDecoder, FrameVisitor};
pub use error::ErrorCode;
pub use frame::{
    CancelPushFrame, DuplicatePushFrame, FrameLengths, GoAwayFrame, MaxPushIdFrame,
    PriorityElementType, PriorityFrame, SettingsFrame,
};
