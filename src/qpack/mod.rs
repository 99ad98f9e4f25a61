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

//! Send side of the QPACK encoder and decoder streams.
//!
//! Instructions are described by table-driven descriptors: an opcode byte
//! with its discriminator bits fixed and an ordered list of fields. The
//! [`encoder::InstructionEncoder`] walks a descriptor and assembles the
//! wire bytes; [`sender`] provides one wrapper per instruction; and
//! [`send_stream::QpackSendStream`] prepends the one-time stream type
//! before the first payload write.
//!
//! # Instruction layouts
//! ## Decoder stream
//! - Insert Count Increment: `00xxxxxx`, 6-bit prefix integer.
//! - Header Acknowledgement: `1xxxxxxx`, 7-bit prefix integer.
//! - Stream Cancellation: `01xxxxxx`, 6-bit prefix integer.
//!
//! ## Encoder stream
//! - Insert With Name Reference: `1Txxxxxx`, static bit, 6-bit name index,
//!   value string.
//! - Insert Without Name Reference: `01Hxxxxx`, name string, value string.
//! - Duplicate: `000xxxxx`, 5-bit prefix integer.
//! - Set Dynamic Table Capacity: `001xxxxx`, 5-bit prefix integer.

pub mod encoder;
mod integer;
pub mod send_stream;
pub mod sender;

/// Field kinds an instruction descriptor can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FieldType {
    /// A single-bit flag ORed into the opcode byte; `param` is the mask.
    Sbit,
    /// A prefix integer; `param` is the prefix bit count.
    Varint,
    /// A length-prefixed name string; `param` is both the prefix bit count
    /// and the bit index of the Huffman flag.
    Name,
    /// A length-prefixed value string, parameterized like `Name`.
    Value,
}

pub(crate) struct InstructionField {
    pub(crate) ty: FieldType,
    pub(crate) param: u8,
}

/// A wire instruction: fixed opcode bits plus an ordered field list.
pub(crate) struct Instruction {
    pub(crate) opcode: u8,
    pub(crate) fields: &'static [InstructionField],
}

pub(crate) static INSERT_COUNT_INCREMENT_INSTRUCTION: Instruction = Instruction {
    opcode: 0x00,
    fields: &[InstructionField {
        ty: FieldType::Varint,
        param: 6,
    }],
};

pub(crate) static HEADER_ACKNOWLEDGEMENT_INSTRUCTION: Instruction = Instruction {
    opcode: 0x80,
    fields: &[InstructionField {
        ty: FieldType::Varint,
        param: 7,
    }],
};

pub(crate) static STREAM_CANCELLATION_INSTRUCTION: Instruction = Instruction {
    opcode: 0x40,
    fields: &[InstructionField {
        ty: FieldType::Varint,
        param: 6,
    }],
};

pub(crate) static INSERT_WITH_NAME_REFERENCE_INSTRUCTION: Instruction = Instruction {
    opcode: 0x80,
    fields: &[
        InstructionField {
            ty: FieldType::Sbit,
            param: 0x40,
        },
        InstructionField {
            ty: FieldType::Varint,
            param: 6,
        },
        InstructionField {
            ty: FieldType::Value,
            param: 7,
        },
    ],
};

pub(crate) static INSERT_WITHOUT_NAME_REFERENCE_INSTRUCTION: Instruction = Instruction {
    opcode: 0x40,
    fields: &[
        InstructionField {
            ty: FieldType::Name,
            param: 5,
        },
        InstructionField {
            ty: FieldType::Value,
            param: 7,
        },
    ],
};

pub(crate) static DUPLICATE_INSTRUCTION: Instruction = Instruction {
    opcode: 0x00,
    fields: &[InstructionField {
        ty: FieldType::Varint,
        param: 5,
    }],
};

pub(crate) static SET_DYNAMIC_TABLE_CAPACITY_INSTRUCTION: Instruction = Instruction {
    opcode: 0x20,
    fields: &[InstructionField {
        ty: FieldType::Varint,
        param: 5,
    }],
};
