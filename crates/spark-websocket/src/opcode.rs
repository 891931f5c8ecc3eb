//! 通用操作码与原始消息类型之间的互译。
//!
//! 通用调用约定使用 RFC 6455 的整数操作码，原始套接字使用封闭枚举 [`MessageType`]。
//! 两个方向都是纯函数；映射失败属于调用方错误，不存在重试语义。

use crate::error::{AdapterError, Result};
use crate::raw::MessageType;

/// 文本帧。
pub const TEXT: u8 = 0x1;
/// 二进制帧。
pub const BINARY: u8 = 0x2;
/// 关闭帧。
pub const CLOSE: u8 = 0x8;

/// 通用操作码转原始消息类型；`{0x1, 0x2, 0x8}` 之外的值返回
/// [`AdapterError::UnsupportedOpcode`]。
pub fn to_native(opcode: u8) -> Result<MessageType> {
    match opcode {
        TEXT => Ok(MessageType::Text),
        BINARY => Ok(MessageType::Binary),
        CLOSE => Ok(MessageType::Close),
        other => Err(AdapterError::UnsupportedOpcode { opcode: other }),
    }
}

/// 原始消息类型转通用操作码。`MessageType` 是封闭枚举，因此该方向是全函数。
pub fn to_generic(message_type: MessageType) -> u8 {
    match message_type {
        MessageType::Text => TEXT,
        MessageType::Binary => BINARY,
        MessageType::Close => CLOSE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_opcodes_round_trip() {
        for opcode in [TEXT, BINARY, CLOSE] {
            let native = to_native(opcode).expect("已知操作码必须可映射");
            assert_eq!(to_generic(native), opcode);
        }
    }

    #[test]
    fn native_types_round_trip() {
        for native in [MessageType::Text, MessageType::Binary, MessageType::Close] {
            assert_eq!(to_native(to_generic(native)).ok(), Some(native));
        }
    }

    proptest! {
        #[test]
        fn every_other_opcode_is_rejected(opcode in any::<u8>()) {
            prop_assume!(![TEXT, BINARY, CLOSE].contains(&opcode));
            match to_native(opcode) {
                Err(AdapterError::UnsupportedOpcode { opcode: reported }) => {
                    prop_assert_eq!(reported, opcode);
                }
                other => prop_assert!(false, "unexpected mapping: {:?}", other),
            }
        }
    }
}
