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

//! Assembly of QPACK instruction bytes from table-driven descriptors.

use crate::huffman::huffman_encode;
use crate::qpack::integer::encode_prefix_integer;
use crate::qpack::{FieldType, Instruction};

/// Serializes QPACK instructions by walking an instruction descriptor's
/// field list.
///
/// The caller sets the inputs relevant to the instruction (`s_bit`,
/// `varint`, `name`, `value`) and then calls `encode`, which appends the
/// wire bytes to the output buffer. The encoder never flushes or fragments
/// output; one call produces one complete instruction.
#[derive(Default)]
pub struct InstructionEncoder {
    s_bit: bool,
    varint: u64,
    name: Vec<u8>,
    value: Vec<u8>,
    // Working byte accumulating opcode and flag bits until the next prefix
    // integer carries it out.
    byte: u8,
}

impl InstructionEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_s_bit(&mut self, s_bit: bool) {
        self.s_bit = s_bit;
    }

    pub fn set_varint(&mut self, value: u64) {
        self.varint = value;
    }

    pub fn set_name(&mut self, name: &[u8]) {
        self.name = name.to_vec();
    }

    pub fn set_value(&mut self, value: &[u8]) {
        self.value = value.to_vec();
    }

    pub(crate) fn encode(&mut self, instruction: &Instruction, dst: &mut Vec<u8>) {
        self.byte = instruction.opcode;
        for field in instruction.fields {
            match field.ty {
                FieldType::Sbit => {
                    if self.s_bit {
                        debug_assert_eq!(0, self.byte & field.param);
                        self.byte |= field.param;
                    }
                }
                FieldType::Varint => {
                    encode_prefix_integer(self.byte, self.varint, prefix_mask(field.param), dst);
                    self.byte = 0;
                }
                FieldType::Name => {
                    Self::write_string(&mut self.byte, &self.name, field.param, dst);
                }
                FieldType::Value => {
                    Self::write_string(&mut self.byte, &self.value, field.param, dst);
                }
            }
        }
    }

    /// Emits a length-prefixed string field. The Huffman form is used, and
    /// the flag bit `1 << param` set, only when it is strictly shorter
    /// than the raw form.
    fn write_string(byte: &mut u8, src: &[u8], param: u8, dst: &mut Vec<u8>) {
        let mut huffman = Vec::with_capacity(src.len());
        huffman_encode(src, &mut huffman);
        let string_to_write: &[u8] = if huffman.len() < src.len() {
            debug_assert_eq!(0, *byte & (1 << param));
            *byte |= 1 << param;
            &huffman
        } else {
            src
        };
        encode_prefix_integer(*byte, string_to_write.len() as u64, prefix_mask(param), dst);
        *byte = 0;
        dst.extend_from_slice(string_to_write);
    }
}

fn prefix_mask(prefix: u8) -> u8 {
    ((1u16 << prefix) - 1) as u8
}
