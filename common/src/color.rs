use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("颜色必须以 # 开头: {0}")]
    MissingHash(String),
    #[error("颜色长度不合法: {0}")]
    InvalidLength(String),
    #[error("颜色包含非十六进制字符: {0}")]
    InvalidDigit(String),
}

/// 像素颜色，每个通道范围 [0, 255]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PixelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PixelColor {
    pub const BLACK: PixelColor = PixelColor::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 解析 `#RRGGBB` 或 `#RGB`，不区分大小写
    pub fn parse_hex(input: &str) -> Result<Self, ColorError> {
        let digits = input
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| ColorError::MissingHash(input.to_string()))?;
        let channel = |s: &str| {
            u8::from_str_radix(s, 16).map_err(|_| ColorError::InvalidDigit(input.to_string()))
        };
        // from_str_radix 接受前导 '+'，先逐字节检查
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidDigit(input.to_string()));
        }
        match digits.len() {
            6 => Ok(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                // #abc 等价于 #aabbcc
                let r = channel(&digits[0..1])?;
                let g = channel(&digits[1..2])?;
                let b = channel(&digits[2..3])?;
                Ok(Self::new(r * 17, g * 17, b * 17))
            }
            _ => Err(ColorError::InvalidLength(input.to_string())),
        }
    }

    /// 按系数调整亮度，每个通道截断取整后限制在 [0, 255]
    pub fn scaled(self, factor: f32) -> Self {
        let scale = |c: u8| (c as f32 * factor).clamp(0.0, 255.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

impl FromStr for PixelColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl TryFrom<String> for PixelColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<PixelColor> for String {
    fn from(color: PixelColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for PixelColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}
