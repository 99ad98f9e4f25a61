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

use thiserror::Error;

/// Wire-level error codes surfaced by the frame layer.
///
/// The decoder latches [`ErrorCode::InternalError`] on parse and size
/// violations; the control-stream coordinator closes the connection with
/// [`ErrorCode::InvalidStreamId`] or [`ErrorCode::HttpDecoderError`] on
/// policy violations. Each error comes with a stable detail string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorCode {
    /// No error has occurred.
    #[error("NO_ERROR")]
    NoError,
    /// The decoder rejected malformed or oversized frame data.
    #[error("INTERNAL_ERROR")]
    InternalError,
    /// A critical stream was reset or misused.
    #[error("INVALID_STREAM_ID")]
    InvalidStreamId,
    /// A frame arrived on a stream where it is not permitted.
    #[error("HTTP_DECODER_ERROR")]
    HttpDecoderError,
}

/// Errors raised by the byte cursor in [`crate::octets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The buffer holds fewer bytes than the read requires. Callers that
    /// stream data buffer the partial field and retry with more input.
    #[error("buffer too short")]
    BufferTooShort,
}
