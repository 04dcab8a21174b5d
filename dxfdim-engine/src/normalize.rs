use tracing::{debug, warn};

use dxfdim_core::document::{Document, Entity, EntityId, EntityKind};
use dxfdim_core::geometry::Point2;
use dxfdim_core::tessellate::{self, ApproximationError, CIRCLE_SEGMENTS, CURVE_SAMPLES};

use crate::errors::EngineError;

/// 待转换的实体种类，多段线本身不需要处理。
const CONVERTIBLE_KINDS: [EntityKind; 4] = [
    EntityKind::Line,
    EntityKind::Circle,
    EntityKind::Arc,
    EntityKind::Curve,
];

/// 离散精度设置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub circle_segments: usize,
    pub curve_samples: usize,
}

impl NormalizeOptions {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.circle_segments < 3 {
            return Err(EngineError::InvalidCircleSegments(self.circle_segments));
        }
        if self.curve_samples < 2 {
            return Err(EngineError::InvalidCurveSamples(self.curve_samples));
        }
        Ok(())
    }
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            circle_segments: CIRCLE_SEGMENTS,
            curve_samples: CURVE_SAMPLES,
        }
    }
}

/// 近似失败而保留原样的曲线。
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCurve {
    pub id: EntityId,
    pub error: ApproximationError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub lines: usize,
    pub circles: usize,
    pub arcs: usize,
    pub curves: usize,
    pub skipped: Vec<SkippedCurve>,
}

impl NormalizeReport {
    #[inline]
    pub fn converted(&self) -> usize {
        self.lines + self.circles + self.arcs + self.curves
    }

    #[inline]
    pub fn has_skipped(&self) -> bool {
        !self.skipped.is_empty()
    }

    fn record(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Line => self.lines += 1,
            EntityKind::Circle => self.circles += 1,
            EntityKind::Arc => self.arcs += 1,
            EntityKind::Curve => self.curves += 1,
            EntityKind::Polyline => {}
        }
    }
}

struct Replacement {
    points: Vec<Point2>,
    is_closed: bool,
}

/// 把文档中所有非多段线实体替换为等价多段线。
///
/// 每种类型先取 ID 快照再逐个替换：先插入新多段线，成功后才删除原实体。
/// 曲线近似失败时原实体保持不变，并记录在报告的 `skipped` 中。
pub fn normalize_document(document: &mut Document, options: &NormalizeOptions) -> NormalizeReport {
    let mut report = NormalizeReport::default();
    for kind in CONVERTIBLE_KINDS {
        let snapshot = document.query_by_kind(kind);
        for id in snapshot {
            let Some(entity) = document.entity(id) else {
                continue;
            };
            match replacement_for(entity, options) {
                Ok(Some(replacement)) => {
                    let point_count = replacement.points.len();
                    let new_id = document.add_polyline(replacement.points, replacement.is_closed);
                    document.delete_entity(id);
                    report.record(kind);
                    debug!(
                        kind = %kind,
                        original = id.get(),
                        replacement = new_id.get(),
                        point_count,
                        "实体已转换为多段线"
                    );
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(entity = id.get(), error = %error, "曲线近似失败，保留原实体且不计入尺寸");
                    report.skipped.push(SkippedCurve { id, error });
                }
            }
        }
    }
    report
}

fn replacement_for(
    entity: &Entity,
    options: &NormalizeOptions,
) -> Result<Option<Replacement>, ApproximationError> {
    let replacement = match entity {
        Entity::Line(line) => Replacement {
            points: vec![line.start, line.end],
            is_closed: false,
        },
        Entity::Circle(circle) => Replacement {
            points: tessellate::tessellate_circle_with(
                circle.center,
                circle.radius,
                options.circle_segments,
            ),
            is_closed: true,
        },
        Entity::Arc(arc) => Replacement {
            points: tessellate::tessellate_arc(arc, options.circle_segments),
            is_closed: false,
        },
        Entity::Curve(curve) => Replacement {
            points: tessellate::tessellate_curve(curve, options.curve_samples)?,
            is_closed: false,
        },
        Entity::Polyline(_) => return Ok(None),
    };
    Ok(Some(replacement))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxfdim_core::document::{Curve, Spline};
    use std::f64::consts::FRAC_PI_2;

    fn kinds(document: &Document) -> Vec<EntityKind> {
        document.entities().map(|(_, entity)| entity.kind()).collect()
    }

    #[test]
    fn line_becomes_open_two_point_polyline() {
        let mut document = Document::new();
        document.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));

        let report = normalize_document(&mut document, &NormalizeOptions::default());

        assert_eq!(report.lines, 1);
        let polyline = document.polylines().next().expect("polyline missing");
        assert!(!polyline.is_closed);
        let points: Vec<Point2> = polyline.points().collect();
        assert_eq!(points, vec![Point2::new(0.0, 0.0), Point2::new(10.0, 0.0)]);
    }

    #[test]
    fn circle_becomes_closed_36_point_polyline() {
        let mut document = Document::new();
        document.add_circle(Point2::new(0.0, 0.0), 5.0);

        normalize_document(&mut document, &NormalizeOptions::default());

        assert_eq!(kinds(&document), vec![EntityKind::Polyline]);
        let polyline = document.polylines().next().expect("polyline missing");
        assert!(polyline.is_closed);
        assert_eq!(polyline.vertices.len(), 36);
    }

    #[test]
    fn mixed_document_keeps_only_polylines() {
        let mut document = Document::new();
        let existing = document.add_polyline([Point2::new(-1.0, -1.0), Point2::new(1.0, 1.0)], false);
        document.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
        document.add_circle(Point2::new(0.0, 0.0), 1.0);
        document.add_line(Point2::new(0.0, 0.0), Point2::new(0.0, 1.0));
        document.add_arc(Point2::new(0.0, 0.0), 2.0, 0.0, FRAC_PI_2);
        document.add_curve(Curve::Spline(Spline::from_control_points(
            2,
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 1.0),
                Point2::new(2.0, 0.0),
            ],
        )));

        let report = normalize_document(&mut document, &NormalizeOptions::default());

        assert_eq!(report.lines, 2);
        assert_eq!(report.circles, 1);
        assert_eq!(report.arcs, 1);
        assert_eq!(report.curves, 1);
        assert_eq!(report.converted(), 5);
        assert!(!report.has_skipped());
        assert_eq!(document.len(), 6);
        assert!(kinds(&document).iter().all(|kind| *kind == EntityKind::Polyline));
        // 原有多段线保持原 ID 与顶点。
        match document.entity(existing) {
            Some(Entity::Polyline(polyline)) => assert_eq!(polyline.vertices.len(), 2),
            other => panic!("existing polyline changed: {other:?}"),
        }
    }

    #[test]
    fn failed_curve_is_left_untouched_and_reported() {
        let broken = Curve::Spline(Spline::from_control_points(3, Vec::new()));
        let mut document = Document::new();
        let id = document.add_curve(broken.clone());
        document.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));

        let report = normalize_document(&mut document, &NormalizeOptions::default());

        assert_eq!(report.converted(), 1);
        assert_eq!(
            report.skipped,
            vec![SkippedCurve {
                id,
                error: ApproximationError::NotEnoughFitPoints(0),
            }]
        );
        assert_eq!(document.entity(id), Some(&Entity::Curve(broken)));
    }

    #[test]
    fn custom_segment_count_is_honoured() {
        let mut document = Document::new();
        document.add_circle(Point2::new(0.0, 0.0), 1.0);
        document.add_curve(Curve::Spline(Spline::from_control_points(
            1,
            vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)],
        )));
        let options = NormalizeOptions {
            circle_segments: 8,
            curve_samples: 4,
        };

        normalize_document(&mut document, &options);

        let lengths: Vec<usize> = document.polylines().map(|p| p.vertices.len()).collect();
        assert_eq!(lengths, vec![8, 4]);
    }

    #[test]
    fn options_are_validated() {
        let options = NormalizeOptions {
            circle_segments: 2,
            curve_samples: 50,
        };
        assert_eq!(options.validate(), Err(EngineError::InvalidCircleSegments(2)));
        let options = NormalizeOptions {
            circle_segments: 36,
            curve_samples: 1,
        };
        assert_eq!(options.validate(), Err(EngineError::InvalidCurveSamples(1)));
        assert!(NormalizeOptions::default().validate().is_ok());
    }
}
