use std::fmt;

use tracing::{debug, warn};

use dxfdim_core::document::Document;
use dxfdim_core::geometry::{Bounds2D, Point2};

use crate::errors::EngineError;
use crate::normalize::{NormalizeOptions, NormalizeReport, normalize_document};

/// 宽高取整规则，两个方向始终使用同一规则。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMode {
    /// 银行家舍入：`2.5 -> 2`，`3.5 -> 4`。
    #[default]
    HalfToEven,
    /// 四舍五入：`2.5 -> 3`。
    HalfAwayFromZero,
}

impl RoundingMode {
    /// 取整结果不是有限值或超出 `i64` 范围时返回 None。
    pub fn apply(self, value: f64) -> Option<i64> {
        let rounded = match self {
            RoundingMode::HalfToEven => value.round_ties_even(),
            RoundingMode::HalfAwayFromZero => value.round(),
        };
        // `i64::MAX as f64` 等于 2^63，本身已越界。
        if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
            Some(rounded as i64)
        } else {
            None
        }
    }
}

/// 流式累积的包围盒，`point_count == 0` 时不可读取尺寸。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    point_count: usize,
}

impl BoundingBox {
    pub fn new() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
            point_count: 0,
        }
    }

    /// 遍历文档中全部多段线的全部顶点；其余实体不贡献点。
    pub fn accumulate(document: &Document) -> Self {
        document
            .polylines()
            .flat_map(|polyline| polyline.points())
            .collect()
    }

    pub fn include(&mut self, point: Point2) {
        self.min_x = self.min_x.min(point.x());
        self.min_y = self.min_y.min(point.y());
        self.max_x = self.max_x.max(point.x());
        self.max_y = self.max_y.max(point.y());
        self.point_count += 1;
    }

    #[inline]
    pub fn point_count(&self) -> usize {
        self.point_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.point_count == 0
    }

    pub fn bounds(&self) -> Option<Bounds2D> {
        if self.is_empty() {
            None
        } else {
            Some(Bounds2D::new(
                Point2::new(self.min_x, self.min_y),
                Point2::new(self.max_x, self.max_y),
            ))
        }
    }

    /// 未取整的宽高。
    pub fn extent(&self) -> Option<(f64, f64)> {
        self.bounds().map(|bounds| (bounds.width(), bounds.height()))
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new()
    }
}

impl Extend<Point2> for BoundingBox {
    fn extend<I: IntoIterator<Item = Point2>>(&mut self, iter: I) {
        for point in iter {
            self.include(point);
        }
    }
}

impl FromIterator<Point2> for BoundingBox {
    fn from_iter<I: IntoIterator<Item = Point2>>(iter: I) -> Self {
        let mut bbox = Self::new();
        bbox.extend(iter);
        bbox
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: i64,
    pub height: i64,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 测量结果。`NoGeometry` 表示没有可测量的点（或宽高无法表示为整数），调用方应跳过该文档而不是当作 0 尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Dimensions(Dimensions),
    NoGeometry,
}

impl Measurement {
    /// 由包围盒推导取整后的宽高。
    pub fn from_bounding_box(bbox: &BoundingBox, rounding: RoundingMode) -> Self {
        let Some((width, height)) = bbox.extent() else {
            return Measurement::NoGeometry;
        };
        match (rounding.apply(width), rounding.apply(height)) {
            (Some(width), Some(height)) => Measurement::Dimensions(Dimensions { width, height }),
            _ => Measurement::NoGeometry,
        }
    }

    #[inline]
    pub fn dimensions(self) -> Option<Dimensions> {
        match self {
            Measurement::Dimensions(dimensions) => Some(dimensions),
            Measurement::NoGeometry => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasureOptions {
    pub normalize: NormalizeOptions,
    pub rounding: RoundingMode,
}

impl MeasureOptions {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.normalize.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasureReport {
    pub measurement: Measurement,
    pub normalize: NormalizeReport,
    pub bounding_box: BoundingBox,
}

/// 使用默认设置（36 段圆、50 个曲线采样、银行家舍入）测量文档。
pub fn measure(document: &mut Document) -> Measurement {
    run(document, &MeasureOptions::default()).measurement
}

/// 校验设置后测量文档，并返回转换与包围盒细节。
pub fn measure_with(
    document: &mut Document,
    options: &MeasureOptions,
) -> Result<MeasureReport, EngineError> {
    options.validate()?;
    Ok(run(document, options))
}

fn run(document: &mut Document, options: &MeasureOptions) -> MeasureReport {
    let normalize = normalize_document(document, &options.normalize);
    let bounding_box = BoundingBox::accumulate(document);
    let measurement = Measurement::from_bounding_box(&bounding_box, options.rounding);
    if measurement == Measurement::NoGeometry && !bounding_box.is_empty() {
        warn!(extent = ?bounding_box.extent(), "包围盒尺寸超出可表示范围，视为无几何");
    }
    debug!(
        converted = normalize.converted(),
        skipped = normalize.skipped.len(),
        point_count = bounding_box.point_count(),
        ?measurement,
        "文档测量完成"
    );
    MeasureReport {
        measurement,
        normalize,
        bounding_box,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxfdim_core::document::{Curve, Entity, Spline};

    #[test]
    fn line_measures_ten_by_zero() {
        let mut document = Document::new();
        document.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));

        let measurement = measure(&mut document);

        assert_eq!(
            measurement,
            Measurement::Dimensions(Dimensions {
                width: 10,
                height: 0
            })
        );
    }

    #[test]
    fn circle_extent_is_close_to_diameter() {
        let mut document = Document::new();
        document.add_circle(Point2::new(0.0, 0.0), 5.0);

        let report = measure_with(&mut document, &MeasureOptions::default()).unwrap();

        assert_eq!(report.bounding_box.point_count(), 36);
        let (width, height) = report.bounding_box.extent().expect("non-empty box");
        assert!((width - 10.0).abs() < 0.1);
        assert!((height - 10.0).abs() < 0.1);
        assert_eq!(
            report.measurement.dimensions(),
            Some(Dimensions {
                width: 10,
                height: 10
            })
        );
    }

    #[test]
    fn empty_document_has_no_geometry() {
        let mut document = Document::new();
        assert_eq!(measure(&mut document), Measurement::NoGeometry);
    }

    #[test]
    fn only_failing_curve_has_no_geometry() {
        let broken = Curve::Spline(Spline::from_control_points(0, vec![Point2::new(1.0, 1.0)]));
        let mut document = Document::new();
        let id = document.add_curve(broken.clone());

        let report = measure_with(&mut document, &MeasureOptions::default()).unwrap();

        assert_eq!(report.measurement, Measurement::NoGeometry);
        assert_eq!(report.normalize.skipped.len(), 1);
        assert_eq!(report.bounding_box.point_count(), 0);
        assert!(report.bounding_box.bounds().is_none());
        assert_eq!(document.len(), 1);
        assert_eq!(document.entity(id), Some(&Entity::Curve(broken)));
    }

    #[test]
    fn measuring_twice_is_idempotent() {
        let mut document = Document::new();
        document.add_line(Point2::new(-3.0, 2.0), Point2::new(40.0, 2.0));
        document.add_circle(Point2::new(10.0, 10.0), 7.25);
        document.add_arc(Point2::new(30.0, 0.0), 4.0, 0.0, std::f64::consts::PI);

        let first = measure_with(&mut document, &MeasureOptions::default()).unwrap();
        let snapshot: Vec<_> = document.entities().cloned().collect();
        let second = measure_with(&mut document, &MeasureOptions::default()).unwrap();

        assert_eq!(first.measurement, second.measurement);
        assert_eq!(first.bounding_box, second.bounding_box);
        assert_eq!(second.normalize.converted(), 0);
        let after: Vec<_> = document.entities().cloned().collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn bounding_box_ignores_point_order() {
        let points = vec![
            Point2::new(3.5, -1.0),
            Point2::new(-2.0, 4.0),
            Point2::new(0.0, 0.0),
            Point2::new(7.25, 2.5),
            Point2::new(1.0, -6.5),
        ];
        let forward: BoundingBox = points.iter().copied().collect();
        let backward: BoundingBox = points.iter().rev().copied().collect();
        let mut rotated = BoundingBox::new();
        rotated.extend(points[2..].iter().chain(points[..2].iter()).copied());

        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
        let bounds = forward.bounds().unwrap();
        assert_eq!(bounds.min(), Point2::new(-2.0, -6.5));
        assert_eq!(bounds.max(), Point2::new(7.25, 4.0));
        assert_eq!(forward.point_count(), 5);
    }

    #[test]
    fn half_values_round_the_same_way_on_both_axes() {
        let mut document = Document::new();
        document.add_polyline([Point2::new(0.0, 0.0), Point2::new(2.5, 3.5)], false);

        let half_even = measure(&mut document);
        assert_eq!(
            half_even.dimensions(),
            Some(Dimensions {
                width: 2,
                height: 4
            })
        );

        let options = MeasureOptions {
            rounding: RoundingMode::HalfAwayFromZero,
            ..MeasureOptions::default()
        };
        let half_away = measure_with(&mut document, &options).unwrap();
        assert_eq!(
            half_away.measurement.dimensions(),
            Some(Dimensions {
                width: 3,
                height: 4
            })
        );
    }

    #[test]
    fn equal_half_extents_round_identically() {
        let bbox: BoundingBox = [Point2::new(1.0, 1.0), Point2::new(3.5, 3.5)]
            .into_iter()
            .collect();
        let measurement = Measurement::from_bounding_box(&bbox, RoundingMode::HalfToEven);
        assert_eq!(
            measurement.dimensions(),
            Some(Dimensions {
                width: 2,
                height: 2
            })
        );
    }

    #[test]
    fn single_point_has_zero_size() {
        let bbox: BoundingBox = std::iter::once(Point2::new(4.0, 4.0)).collect();
        assert_eq!(
            Measurement::from_bounding_box(&bbox, RoundingMode::default()),
            Measurement::Dimensions(Dimensions {
                width: 0,
                height: 0
            })
        );
    }

    #[test]
    fn invalid_options_are_rejected_before_mutation() {
        let mut document = Document::new();
        document.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        let options = MeasureOptions {
            normalize: NormalizeOptions {
                circle_segments: 0,
                curve_samples: 50,
            },
            ..MeasureOptions::default()
        };

        let err = measure_with(&mut document, &options).unwrap_err();

        assert_eq!(err, EngineError::InvalidCircleSegments(0));
        assert_eq!(document.polylines().count(), 0);
    }

    #[test]
    fn unrepresentable_extent_has_no_geometry() {
        let mut document = Document::new();
        document.add_line(Point2::new(-1e308, 0.0), Point2::new(1e308, 5.0));

        let report = measure_with(&mut document, &MeasureOptions::default()).unwrap();

        assert_eq!(report.bounding_box.point_count(), 2);
        assert_eq!(report.measurement, Measurement::NoGeometry);

        let huge: BoundingBox = [Point2::new(0.0, 0.0), Point2::new(1e19, 1.0)]
            .into_iter()
            .collect();
        assert_eq!(
            Measurement::from_bounding_box(&huge, RoundingMode::HalfAwayFromZero),
            Measurement::NoGeometry
        );
    }

    #[test]
    fn rounding_rejects_out_of_range_values() {
        assert_eq!(RoundingMode::HalfToEven.apply(2.5), Some(2));
        assert_eq!(RoundingMode::HalfAwayFromZero.apply(2.5), Some(3));
        assert_eq!(RoundingMode::HalfToEven.apply(f64::INFINITY), None);
        assert_eq!(RoundingMode::HalfToEven.apply(f64::NAN), None);
        assert_eq!(RoundingMode::HalfAwayFromZero.apply(9.3e18), None);
    }

    #[test]
    fn dimensions_display_as_width_by_height() {
        let dims = Dimensions {
            width: 120,
            height: 45,
        };
        assert_eq!(dims.to_string(), "120x45");
    }
}
