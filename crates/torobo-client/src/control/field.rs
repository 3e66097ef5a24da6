//! 稳定场与轨迹数据集
//!
//! 稳定场（Stabilization Field）是一个纯函数：输入一批笛卡尔误差
//! （每列一个点），输出同样列数的速度向量。控制循环每次迭代调用一次，
//! 把所有列的速度求和得到聚合的期望速度。
//!
//! 任何 `Fn(&DMatrix<f64>) -> DMatrix<f64>` 闭包都实现了 [`StabilizationField`]。

use crate::error::{ControlError, Result};
use nalgebra::{DMatrix, DVector, Vector3};

/// 笛卡尔位置维度（误差范数只看前三维）
pub const POSITION_DIM: usize = 3;

/// 稳定场接口
pub trait StabilizationField {
    /// 对一批误差求速度
    ///
    /// `errors` 的每一列是一个点相对目标点的偏移。
    fn evaluate(&self, errors: &DMatrix<f64>) -> DMatrix<f64>;
}

impl<F> StabilizationField for F
where
    F: Fn(&DMatrix<f64>) -> DMatrix<f64>,
{
    fn evaluate(&self, errors: &DMatrix<f64>) -> DMatrix<f64> {
        self(errors)
    }
}

/// 线性稳定场 `f(e) = -gain * e[0..3]`
///
/// 最简单的全局渐近稳定场，用于仿真和测试。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearField {
    /// 增益（1/s）
    pub gain: f64,
}

impl LinearField {
    /// 创建线性稳定场
    pub fn new(gain: f64) -> Self {
        LinearField { gain }
    }
}

impl StabilizationField for LinearField {
    fn evaluate(&self, errors: &DMatrix<f64>) -> DMatrix<f64> {
        let rows = errors.nrows().min(POSITION_DIM);
        errors.rows(0, rows) * -self.gain
    }
}

/// 轨迹数据集
///
/// 每列是一个笛卡尔点（至少三维），最后一列约定为目标点 `x_des`。
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryDataset {
    points: DMatrix<f64>,
}

impl TrajectoryDataset {
    /// 从矩阵创建数据集（每列一个点）
    ///
    /// # 错误
    ///
    /// - 行数小于 3、没有列，或包含非有限值
    pub fn new(points: DMatrix<f64>) -> Result<Self> {
        if points.nrows() < POSITION_DIM {
            return Err(ControlError::invalid_parameter(
                "dataset",
                format!(
                    "points must have at least {POSITION_DIM} rows, got {}",
                    points.nrows()
                ),
            ));
        }
        if points.ncols() == 0 {
            return Err(ControlError::invalid_parameter("dataset", "dataset is empty"));
        }
        if points.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::invalid_parameter(
                "dataset",
                "all values must be finite",
            ));
        }
        Ok(TrajectoryDataset { points })
    }

    /// 从点列表创建数据集（每个点成为一列）
    pub fn from_points(points: &[Vec<f64>]) -> Result<Self> {
        let dim = points.first().map_or(0, Vec::len);
        if let Some(bad) = points.iter().position(|p| p.len() != dim) {
            return Err(ControlError::invalid_parameter(
                "dataset",
                format!(
                    "point {bad} has {} values, expected {dim}",
                    points[bad].len()
                ),
            ));
        }
        let columns: Vec<DVector<f64>> =
            points.iter().map(|p| DVector::from_column_slice(p)).collect();
        if columns.is_empty() {
            return Err(ControlError::invalid_parameter("dataset", "dataset is empty"));
        }
        Self::new(DMatrix::from_columns(&columns))
    }

    /// 点的维度
    pub fn dim(&self) -> usize {
        self.points.nrows()
    }

    /// 点的数量
    pub fn len(&self) -> usize {
        self.points.ncols()
    }

    /// 是否为空（构造时已保证非空）
    pub fn is_empty(&self) -> bool {
        self.points.ncols() == 0
    }

    /// 原始点矩阵
    pub fn points(&self) -> &DMatrix<f64> {
        &self.points
    }

    /// 目标点 `x_des`（最后一列）
    pub fn destination(&self) -> DVector<f64> {
        self.points.column(self.points.ncols() - 1).into_owned()
    }

    /// 目标点的位置分量
    pub fn destination_position(&self) -> Vector3<f64> {
        self.points
            .fixed_view::<POSITION_DIM, 1>(0, self.points.ncols() - 1)
            .into_owned()
    }

    /// 所有点相对目标点的偏移 `data - x_des`
    pub fn offsets(&self) -> DMatrix<f64> {
        let destination = self.destination();
        let mut offsets = self.points.clone();
        for mut column in offsets.column_iter_mut() {
            column -= &destination;
        }
        offsets
    }
}

/// 聚合期望速度：对整批偏移求场，再把所有列求和
///
/// # 错误
///
/// - `ControlError::FieldDimension`: 场输出不是三行
pub fn aggregate_velocity<F: StabilizationField + ?Sized>(
    field: &F,
    offsets: &DMatrix<f64>,
) -> Result<Vector3<f64>> {
    let velocities = field.evaluate(offsets);
    if velocities.nrows() != POSITION_DIM {
        return Err(ControlError::FieldDimension {
            expected: POSITION_DIM,
            rows: velocities.nrows(),
        });
    }
    let sum = velocities.column_sum();
    Ok(Vector3::new(sum[0], sum[1], sum[2]))
}
