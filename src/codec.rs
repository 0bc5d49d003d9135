//! 词库编码
//!
//! 答案列表做单字节 XOR 混淆，校验词典只存 32 位哈希。
//! 两者都不是加密：掩码是公开的，拿到文件和本模块就能还原词表。

use crate::{Error, Result};
use sha2::{Digest, Sha256};

/// 答案文件每个字节使用的掩码
pub const XOR_MASK: u8 = 0x55;

const DELIMITER: char = ',';

/// 逗号分隔词表的逐字节 XOR 混淆，可逆
#[derive(Debug, Clone, Copy)]
pub struct XorCodec {
    mask: u8,
}

impl XorCodec {
    pub fn new(mask: u8) -> Self {
        XorCodec { mask }
    }

    pub fn encode<S: AsRef<str>>(&self, words: &[S]) -> Vec<u8> {
        let joined = words
            .iter()
            .map(|w| w.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        joined.bytes().map(|b| b ^ self.mask).collect()
    }

    /// 去掩码后按分隔符拆分，丢弃空项
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let plain: Vec<u8> = bytes.iter().map(|b| b ^ self.mask).collect();
        let text = String::from_utf8(plain)
            .map_err(|e| Error::Codec(format!("答案文件去掩码后不是 utf-8: {}", e)))?;

        Ok(text
            .split(DELIMITER)
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl Default for XorCodec {
    fn default() -> Self {
        XorCodec::new(XOR_MASK)
    }
}

/// 规范化：去空白并转大写
pub fn normalize(word: &str) -> String {
    word.trim().to_uppercase()
}

/// 词典哈希：规范化单词的 SHA-256 前四个字节，按大端读取。
/// 跨平台稳定，碰撞可以接受
pub fn word_hash(word: &str) -> u32 {
    let digest = Sha256::digest(normalize(word).as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// 哈希的小写十六进制形式，供工具输出
pub fn word_hash_hex(word: &str) -> String {
    hex::encode(word_hash(word).to_be_bytes())
}

/// 小端 u32 数组，即 `val<N>.dat` 的格式
pub fn encode_hashes(hashes: impl IntoIterator<Item = u32>) -> Vec<u8> {
    hashes.into_iter().flat_map(u32::to_le_bytes).collect()
}

pub fn decode_hashes(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Codec(format!(
            "校验数据长度为 {} 字节，不是 4 的倍数",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// 整理答案列表用的复数判断：以 `S` 结尾但不是 `SS`
pub fn is_plural_candidate(word: &str) -> bool {
    let word = normalize(word);
    word.ends_with('S') && !word.ends_with("SS")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_masks_every_byte() {
        let codec = XorCodec::default();
        let bytes = codec.encode(&["AB", "CD"]);
        assert_eq!(bytes, vec![0x14, 0x17, 0x79, 0x16, 0x11]);
        assert_eq!(codec.decode(&bytes).unwrap(), vec!["AB", "CD"]);
    }

    #[test]
    fn decode_drops_empty_tokens() {
        let codec = XorCodec::default();
        let raw: Vec<u8> = ",CRANE,,SLATE,".bytes().map(|b| b ^ XOR_MASK).collect();
        assert_eq!(codec.decode(&raw).unwrap(), vec!["CRANE", "SLATE"]);
        assert!(codec.decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn hash_is_case_insensitive_and_fixed() {
        assert_eq!(word_hash("crane"), word_hash("CRANE"));
        assert_eq!(word_hash(" Crane "), word_hash("CRANE"));
        assert_eq!(word_hash("CRANE"), 3_258_971_368);
        assert_eq!(word_hash_hex("ERECT"), "e61a6a46");
    }

    #[test]
    fn hash_array_is_little_endian() {
        let bytes = encode_hashes([1u32, 0x0102_0304]);
        assert_eq!(bytes, vec![1, 0, 0, 0, 4, 3, 2, 1]);
        assert_eq!(decode_hashes(&bytes).unwrap(), vec![1, 0x0102_0304]);
    }

    #[test]
    fn truncated_hash_array_is_rejected() {
        assert!(matches!(decode_hashes(&[1, 2, 3]), Err(Error::Codec(_))));
    }

    #[test]
    fn plural_heuristic() {
        assert!(is_plural_candidate("CATS"));
        assert!(!is_plural_candidate("GLASS"));
        assert!(!is_plural_candidate("CRANE"));
    }
}
