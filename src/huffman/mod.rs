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

//! [Huffman coding] of RFC 7541, shared by HPACK and QPACK for header
//! string literals. Only encoding is needed here; the QPACK instruction
//! encoder uses it when the Huffman form of a string is strictly shorter
//! than the raw form.
//!
//! [Huffman coding]: https://www.rfc-editor.org/rfc/rfc7541.html#ref-HUFFMAN

mod consts;

use consts::HUFFMAN_ENCODE;

/// Huffman-encodes `src` and appends the result to `dst`.
pub(crate) fn huffman_encode(src: &[u8], dst: &mut Vec<u8>) {
    // Right-aligned bit accumulator. `filled` is how many of its low bits
    // are occupied; it never exceeds 7 between symbols, and the longest
    // code is 30 bits, so the accumulator cannot overflow.
    let mut acc: u64 = 0;
    let mut filled: u64 = 0;

    for &byte in src {
        let (nbits, code) = HUFFMAN_ENCODE[byte as usize];
        acc = (acc << nbits) | code;
        filled += nbits;
        while filled >= 8 {
            filled -= 8;
            dst.push((acc >> filled) as u8);
        }
        acc &= (1 << filled) - 1;
    }

    // An incomplete final byte is topped up with ones, a prefix of the
    // EOS symbol.
    if filled > 0 {
        let pad = 8 - filled;
        dst.push(((acc << pad) as u8) | ((1u8 << pad) - 1));
    }
}
