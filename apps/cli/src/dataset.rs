//! 轨迹数据集文件
//!
//! JSON 数组，每个元素是一个点（至少三维），最后一个点是目标点：
//!
//! ```json
//! [[0.0, 0.0, 0.30], [0.0, 0.0, 0.45], [0.0, 0.0, 0.60]]
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use torobo_client::TrajectoryDataset;

/// 从 JSON 字符串解析数据集
pub fn parse(content: &str) -> Result<TrajectoryDataset> {
    let points: Vec<Vec<f64>> =
        serde_json::from_str(content).context("Dataset must be a JSON array of points")?;
    Ok(TrajectoryDataset::from_points(&points)?)
}

/// 从文件加载数据集
pub fn load(path: &Path) -> Result<TrajectoryDataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid dataset {}", path.display()))
}
