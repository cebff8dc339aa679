use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::ValueEnum;
use common::webhook::InfoResponse;
use serde::Deserialize;
use thiserror::Error;

use crate::{engine::EngineTimeouts, renderer::Palette, surface::SurfaceSize};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path} 失败: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("配置文件格式错误: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("环境变量 PORT 不是合法端口: {0}")]
    InvalidPort(String),
}

/// 全部配置，每一项都有默认值，配置文件只需要写要改的部分
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub surface: SurfaceConfig,
    pub render: RenderConfig,
    pub palette: Palette,
    /// `GET /` 返回的蛇外观
    pub snake: InfoResponse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5555,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 元数据查询地址
    pub api_base: String,
    /// websocket 事件流地址
    pub stream_base: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// 超过这个时间没有收到消息就放弃这一局
    pub idle_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let timeouts = EngineTimeouts::default();
        Self {
            api_base: "https://engine.battlesnake.com".to_string(),
            stream_base: "wss://engine.battlesnake.com".to_string(),
            connect_timeout_ms: timeouts.connect.as_millis() as u64,
            request_timeout_ms: timeouts.request.as_millis() as u64,
            idle_timeout_ms: timeouts.idle.as_millis() as u64,
        }
    }
}

impl EngineConfig {
    pub fn timeouts(&self) -> EngineTimeouts {
        EngineTimeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            request: Duration::from_millis(self.request_timeout_ms),
            idle: Duration::from_millis(self.idle_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// 在终端里显示
    #[default]
    Terminal,
    /// 只写入内存，不显示
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub columns: usize,
    pub rows: usize,
    pub kind: SurfaceKind,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        // 单块 32x16 点阵屏
        Self {
            columns: 32,
            rows: 16,
            kind: SurfaceKind::Terminal,
        }
    }
}

impl SurfaceConfig {
    pub fn size(&self) -> SurfaceSize {
        SurfaceSize::new(self.columns, self.rows)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// 同时进行的渲染任务上限
    pub workers: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl DisplayConfig {
    /// 没有指定文件时使用默认值，随后应用 `PORT` 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_port(std::env::var("PORT").ok())?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn apply_port(&mut self, port: Option<String>) -> Result<(), ConfigError> {
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        Ok(())
    }
}
