//! 将圆、圆弧与参数曲线离散为有序点列。
//!
//! 圆固定 36 段（最大径向误差约为半径的 0.38%），曲线默认取 50 个采样点。

use std::f64::consts::TAU;

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Arc, Curve, Ellipse, Spline};
use crate::geometry::{Point2, Vector2};

pub const CIRCLE_SEGMENTS: usize = 36;
pub const CURVE_SAMPLES: usize = 50;

const PARAMETER_EPSILON: f64 = 1e-9;
const FIT_POINT_EPSILON: f64 = 1e-9;
const PIVOT_EPSILON: f64 = 1e-12;

/// 单条曲线近似失败的原因。只影响该实体，不会中断整份文档的处理。
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ApproximationError {
    #[error("at least 2 samples are required, got {0}")]
    TooFewSamples(usize),
    #[error("spline degree must be at least 1, got {0}")]
    InvalidDegree(i32),
    #[error("spline has no control points and only {0} fit point(s)")]
    NotEnoughFitPoints(usize),
    #[error("spline of degree {degree} needs at least {required} control points, got {actual}")]
    NotEnoughControlPoints {
        degree: usize,
        required: usize,
        actual: usize,
    },
    #[error("expected {expected} knot values, got {actual}")]
    KnotCountMismatch { expected: usize, actual: usize },
    #[error("knot vector is not a non-decreasing sequence of finite values (index {0})")]
    InvalidKnots(usize),
    #[error("spline parameter domain [{start}, {end}] is empty")]
    EmptyDomain { start: f64, end: f64 },
    #[error("expected {expected} weights, got {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },
    #[error("weight {value} at index {index} is not positive")]
    NonPositiveWeight { index: usize, value: f64 },
    #[error("fit points are coincident")]
    CoincidentFitPoints,
    #[error("fit point interpolation system is singular")]
    SingularInterpolation,
    #[error("ellipse major axis has zero length")]
    ZeroMajorAxis,
    #[error("ellipse ratio {0} is not a positive finite number")]
    InvalidRatio(f64),
    #[error("curve evaluates to a non-finite point at parameter {0}")]
    NonFinite(f64),
}

/// 以 36 段均分整圆，返回闭合点列（不重复首点）。
pub fn tessellate_circle(center: Point2, radius: f64) -> Vec<Point2> {
    tessellate_circle_with(center, radius, CIRCLE_SEGMENTS)
}

pub fn tessellate_circle_with(center: Point2, radius: f64, segments: usize) -> Vec<Point2> {
    let radius = radius.abs();
    (0..segments)
        .map(|i| {
            let angle = TAU * i as f64 / segments as f64;
            point_on_circle(center, radius, angle)
        })
        .collect()
}

/// 按整圆 `segments_per_turn` 段的密度离散圆弧，首尾端点均包含在内。
pub fn tessellate_arc(arc: &Arc, segments_per_turn: usize) -> Vec<Point2> {
    let radius = arc.radius.abs();
    let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
    let sweep = end - start;
    let step = TAU / segments_per_turn.max(1) as f64;
    let segments = ((sweep / step) - PARAMETER_EPSILON).ceil().max(1.0) as usize;
    (0..=segments)
        .map(|i| {
            let angle = start + sweep * (i as f64 / segments as f64);
            point_on_circle(arc.center, radius, angle)
        })
        .collect()
}

/// 在曲线参数域上均匀取 `sample_count` 个参数求值，首尾参数均包含在内。
pub fn tessellate_curve(
    curve: &Curve,
    sample_count: usize,
) -> Result<Vec<Point2>, ApproximationError> {
    if sample_count < 2 {
        return Err(ApproximationError::TooFewSamples(sample_count));
    }
    match curve {
        Curve::Spline(spline) => sample_spline(spline, sample_count),
        Curve::Ellipse(ellipse) => sample_ellipse(ellipse, sample_count),
    }
}

fn point_on_circle(center: Point2, radius: f64, angle: f64) -> Point2 {
    let offset = Vector2::new(radius * angle.cos(), radius * angle.sin());
    center.translate(offset)
}

fn normalize_angle(angle: f64) -> f64 {
    let mut result = angle % TAU;
    if result < 0.0 {
        result += TAU;
    }
    result
}

/// 归一化为逆时针区间 `(start, end]`，起止重合视为整圈。
fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
    let start = normalize_angle(start);
    let mut end = normalize_angle(end);
    if (end - start).abs() < PARAMETER_EPSILON {
        end = start + TAU;
    } else if end < start {
        end += TAU;
    }
    (start, end)
}

fn sample_parameters(start: f64, end: f64, count: usize) -> impl Iterator<Item = f64> {
    let last = count - 1;
    (0..count).map(move |i| {
        if i == last {
            end
        } else {
            start + (end - start) * (i as f64 / last as f64)
        }
    })
}

fn finite_point(value: DVec2, parameter: f64) -> Result<Point2, ApproximationError> {
    if value.is_finite() {
        Ok(Point2::from_vec(value))
    } else {
        Err(ApproximationError::NonFinite(parameter))
    }
}

fn sample_ellipse(ellipse: &Ellipse, count: usize) -> Result<Vec<Point2>, ApproximationError> {
    let major = ellipse.major_axis.as_vec2();
    if !(major.length() > f64::EPSILON) {
        return Err(ApproximationError::ZeroMajorAxis);
    }
    let ratio = ellipse.ratio;
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(ApproximationError::InvalidRatio(ratio));
    }
    let minor = major.perp() * ratio;
    let center = ellipse.center.as_vec2();
    let (start, end) = canonical_interval(ellipse.start_parameter, ellipse.end_parameter);
    sample_parameters(start, end, count)
        .map(|t| finite_point(center + major * t.cos() + minor * t.sin(), t))
        .collect()
}

fn sample_spline(spline: &Spline, count: usize) -> Result<Vec<Point2>, ApproximationError> {
    let curve = BSpline::from_spline(spline)?;
    let (start, end) = curve.domain();
    sample_parameters(start, end, count)
        .map(|t| finite_point(curve.evaluate(t), t))
        .collect()
}

/// 齐次坐标下的 B 样条：控制点存为 `(w·x, w·y, w)`，非有理样条权重全为 1。
#[derive(Debug)]
struct BSpline {
    degree: usize,
    control: Vec<DVec3>,
    knots: Vec<f64>,
}

impl BSpline {
    fn from_spline(spline: &Spline) -> Result<Self, ApproximationError> {
        if spline.degree < 1 {
            return Err(ApproximationError::InvalidDegree(spline.degree));
        }
        let degree = spline.degree as usize;
        if spline.control_points.is_empty() {
            return Self::interpolate(&spline.fit_points, degree, spline.is_closed);
        }

        let count = spline.control_points.len();
        if count < degree + 1 {
            return Err(ApproximationError::NotEnoughControlPoints {
                degree,
                required: degree + 1,
                actual: count,
            });
        }

        let knots = if spline.knot_values.is_empty() {
            clamped_uniform_knots(count, degree)
        } else {
            let expected = count + degree + 1;
            if spline.knot_values.len() != expected {
                return Err(ApproximationError::KnotCountMismatch {
                    expected,
                    actual: spline.knot_values.len(),
                });
            }
            validate_knots(&spline.knot_values)?;
            spline.knot_values.clone()
        };

        let weights = if spline.weights.is_empty() {
            vec![1.0; count]
        } else {
            if spline.weights.len() != count {
                return Err(ApproximationError::WeightCountMismatch {
                    expected: count,
                    actual: spline.weights.len(),
                });
            }
            if let Some((index, value)) = spline
                .weights
                .iter()
                .copied()
                .enumerate()
                .find(|(_, w)| !(w.is_finite() && *w > 0.0))
            {
                return Err(ApproximationError::NonPositiveWeight { index, value });
            }
            spline.weights.clone()
        };

        let control = spline
            .control_points
            .iter()
            .zip(weights)
            .map(|(point, weight)| DVec3::new(point.x() * weight, point.y() * weight, weight))
            .collect();

        let curve = Self {
            degree,
            control,
            knots,
        };
        let (start, end) = curve.domain();
        if !(end - start > PARAMETER_EPSILON) {
            return Err(ApproximationError::EmptyDomain { start, end });
        }
        Ok(curve)
    }

    /// 全局插值：弦长参数化 + 平均节点，求解 `N·P = Q` 得到穿过全部拟合点的控制点。
    ///
    /// 相邻重合的拟合点先合并；闭合样条在末尾补回首个拟合点。
    fn interpolate(
        fit_points: &[Point2],
        degree: usize,
        is_closed: bool,
    ) -> Result<Self, ApproximationError> {
        if fit_points.len() < 2 {
            return Err(ApproximationError::NotEnoughFitPoints(fit_points.len()));
        }
        let mut fit_points = distinct_fit_points(fit_points);
        if fit_points.len() < 2 {
            return Err(ApproximationError::CoincidentFitPoints);
        }
        if is_closed {
            let first = fit_points[0];
            if fit_points.last().is_some_and(|last| !coincident(*last, first)) {
                fit_points.push(first);
            }
        }

        let count = fit_points.len();
        let degree = degree.min(count - 1);
        let params = chord_length_parameters(&fit_points)?;

        let mut knots = vec![0.0; degree + 1];
        for j in 1..(count - degree) {
            let sum: f64 = params[j..j + degree].iter().sum();
            knots.push(sum / degree as f64);
        }
        knots.extend(std::iter::repeat_n(1.0, degree + 1));

        let mut matrix = vec![vec![0.0; count]; count];
        for (row, &u) in params.iter().enumerate() {
            let span = find_span(&knots, degree, count, u);
            let basis = basis_functions(&knots, degree, span, u);
            for (offset, value) in basis.into_iter().enumerate() {
                matrix[row][span - degree + offset] = value;
            }
        }

        let targets = fit_points.iter().map(|point| point.as_vec2()).collect();
        let solved = solve_linear(matrix, targets)?;
        let control = solved
            .into_iter()
            .map(|point| DVec3::new(point.x, point.y, 1.0))
            .collect();

        Ok(Self {
            degree,
            control,
            knots,
        })
    }

    #[inline]
    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control.len()])
    }

    fn evaluate(&self, t: f64) -> DVec2 {
        let span = find_span(&self.knots, self.degree, self.control.len(), t);
        let basis = basis_functions(&self.knots, self.degree, span, t);
        let first = span - self.degree;
        let weighted = basis
            .iter()
            .enumerate()
            .fold(DVec3::ZERO, |acc, (offset, value)| {
                acc + self.control[first + offset] * *value
            });
        DVec2::new(weighted.x / weighted.z, weighted.y / weighted.z)
    }
}

fn clamped_uniform_knots(count: usize, degree: usize) -> Vec<f64> {
    let interior = count - degree - 1;
    let last = (count - degree) as f64;
    let mut knots = vec![0.0; degree + 1];
    knots.extend((1..=interior).map(|i| i as f64));
    knots.extend(std::iter::repeat_n(last, degree + 1));
    knots
}

fn validate_knots(knots: &[f64]) -> Result<(), ApproximationError> {
    if let Some(index) = knots.iter().position(|knot| !knot.is_finite()) {
        return Err(ApproximationError::InvalidKnots(index));
    }
    match knots.windows(2).position(|pair| pair[1] < pair[0]) {
        Some(index) => Err(ApproximationError::InvalidKnots(index + 1)),
        None => Ok(()),
    }
}

fn coincident(a: Point2, b: Point2) -> bool {
    a.as_vec2().distance(b.as_vec2()) <= FIT_POINT_EPSILON
}

fn distinct_fit_points(points: &[Point2]) -> Vec<Point2> {
    let mut distinct: Vec<Point2> = Vec::with_capacity(points.len());
    for &point in points {
        if distinct.last().is_none_or(|last| !coincident(*last, point)) {
            distinct.push(point);
        }
    }
    distinct
}

fn chord_length_parameters(points: &[Point2]) -> Result<Vec<f64>, ApproximationError> {
    let mut params = Vec::with_capacity(points.len());
    let mut total = 0.0;
    params.push(0.0);
    for pair in points.windows(2) {
        total += pair[0].as_vec2().distance(pair[1].as_vec2());
        params.push(total);
    }
    if !(total > f64::EPSILON) {
        return Err(ApproximationError::CoincidentFitPoints);
    }
    for value in params.iter_mut() {
        *value /= total;
    }
    if let Some(last) = params.last_mut() {
        *last = 1.0;
    }
    Ok(params)
}

/// 查找满足 `knots[span] <= t < knots[span + 1]` 的非退化区间；域末端落在最后一个非退化区间。
fn find_span(knots: &[f64], degree: usize, count: usize, t: f64) -> usize {
    let mut span = degree;
    while span < count - 1 && knots[span + 1] <= t {
        span += 1;
    }
    while span > degree && knots[span] >= knots[span + 1] {
        span -= 1;
    }
    span
}

/// Cox–de Boor 递推，返回 `N[span-degree..=span]` 在 `t` 处的值。
fn basis_functions(knots: &[f64], degree: usize, span: usize, t: f64) -> Vec<f64> {
    let mut values = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    values[0] = 1.0;
    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denominator = right[r + 1] + left[j - r];
            let temp = if denominator.abs() <= f64::EPSILON {
                0.0
            } else {
                values[r] / denominator
            };
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
    values
}

/// 列主元高斯消元，右端项为二维点。
fn solve_linear(
    mut matrix: Vec<Vec<f64>>,
    mut rhs: Vec<DVec2>,
) -> Result<Vec<DVec2>, ApproximationError> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .unwrap_or(col);
        if !(matrix[pivot][col].abs() > PIVOT_EPSILON) {
            return Err(ApproximationError::SingularInterpolation);
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in (col + 1)..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                let delta = factor * matrix[col][k];
                matrix[row][k] -= delta;
            }
            let delta = rhs[col] * factor;
            rhs[row] -= delta;
        }
    }

    let mut solution = vec![DVec2::ZERO; n];
    for row in (0..n).rev() {
        let mut acc = rhs[row];
        for k in (row + 1)..n {
            acc -= solution[k] * matrix[row][k];
        }
        solution[row] = acc / matrix[row][row];
    }
    Ok(solution)
}
