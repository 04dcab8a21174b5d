pub mod tessellate;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，保持双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于椭圆主轴与样条切向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，`min <= max`。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            debug_assert!(!self.is_empty());
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            debug_assert!(!self.is_empty());
            self.max.y() - self.min.y()
        }
    }
}

pub mod document {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 实体种类，仅用于按类型查询，不携带几何数据。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum EntityKind {
        Line,
        Circle,
        Arc,
        Curve,
        Polyline,
    }

    impl EntityKind {
        /// 对应的 DXF 实体名称（曲线统一记作 SPLINE）。
        pub fn dxf_name(self) -> &'static str {
            match self {
                EntityKind::Line => "LINE",
                EntityKind::Circle => "CIRCLE",
                EntityKind::Arc => "ARC",
                EntityKind::Curve => "SPLINE",
                EntityKind::Polyline => "LWPOLYLINE",
            }
        }
    }

    impl fmt::Display for EntityKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.dxf_name())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Curve(Curve),
        Polyline(Polyline),
    }

    impl Entity {
        #[inline]
        pub fn kind(&self) -> EntityKind {
            match self {
                Entity::Line(_) => EntityKind::Line,
                Entity::Circle(_) => EntityKind::Circle,
                Entity::Arc(_) => EntityKind::Arc,
                Entity::Curve(_) => EntityKind::Curve,
                Entity::Polyline(_) => EntityKind::Polyline,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
    }

    /// 可采样的参数曲线。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Curve {
        Spline(Spline),
        Ellipse(Ellipse),
    }

    /// 椭圆（弧），记录主轴向量与参数范围（单位为弧度）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
    }

    /// B 样条 / NURBS。控制点为空时由拟合点插值得到；权重为空即非有理样条。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Spline {
        pub degree: i32,
        /// 仅作用于拟合点：闭合样条插值时回到首个拟合点。
        pub is_closed: bool,
        pub control_points: Vec<Point2>,
        pub fit_points: Vec<Point2>,
        pub knot_values: Vec<f64>,
        pub weights: Vec<f64>,
    }

    impl Spline {
        /// 仅由控制点定义的非有理样条，节点向量留空（求值时补齐为钳制均匀节点）。
        pub fn from_control_points(degree: i32, control_points: Vec<Point2>) -> Self {
            Self {
                degree,
                is_closed: false,
                control_points,
                fit_points: Vec::new(),
                knot_values: Vec::new(),
                weights: Vec::new(),
            }
        }

        pub fn from_fit_points(degree: i32, fit_points: Vec<Point2>) -> Self {
            Self {
                fit_points,
                ..Self::from_control_points(degree, Vec::new())
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
    }

    impl Polyline {
        /// 顶点位置序列；bulge 不参与测量。
        pub fn points(&self) -> impl Iterator<Item = Point2> + '_ {
            self.vertices.iter().map(|vertex| vertex.position)
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// 模型空间实体表。实体按插入顺序保存，ID 单调分配且不复用。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_line(&mut self, start: Point2, end: Point2) -> EntityId {
            self.add_entity(Entity::Line(Line { start, end }))
        }

        pub fn add_circle(&mut self, center: Point2, radius: f64) -> EntityId {
            self.add_entity(Entity::Circle(Circle { center, radius }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
        ) -> EntityId {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
            }))
        }

        pub fn add_curve(&mut self, curve: Curve) -> EntityId {
            self.add_entity(Entity::Curve(curve))
        }

        pub fn add_polyline<I>(&mut self, vertices: I, is_closed: bool) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            let collected = vertices
                .into_iter()
                .map(PolylineVertex::new)
                .collect::<Vec<_>>();
            self.add_polyline_with_vertices(collected, is_closed)
        }

        pub fn add_polyline_with_vertices<I>(&mut self, vertices: I, is_closed: bool) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let vertices: Vec<PolylineVertex> = vertices.into_iter().collect();
            self.add_entity(Entity::Polyline(Polyline {
                vertices,
                is_closed,
            }))
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        /// 删除实体并返回原值；ID 不存在时返回 None。
        pub fn delete_entity(&mut self, id: EntityId) -> Option<Entity> {
            let index = self
                .entities
                .iter()
                .position(|(entity_id, _)| *entity_id == id)?;
            Some(self.entities.remove(index).1)
        }

        /// 按类型收集实体 ID 的快照。返回值与文档解耦，调用方可边遍历边增删实体。
        pub fn query_by_kind(&self, kind: EntityKind) -> Vec<EntityId> {
            self.entities
                .iter()
                .filter(|(_, entity)| entity.kind() == kind)
                .map(|(id, _)| *id)
                .collect()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities.iter().find_map(|(entity_id, entity)| {
                if *entity_id == id {
                    Some(entity)
                } else {
                    None
                }
            })
        }

        pub fn polylines(&self) -> impl Iterator<Item = &Polyline> {
            self.entities.iter().filter_map(|(_, entity)| match entity {
                Entity::Polyline(polyline) => Some(polyline),
                _ => None,
            })
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.entities.is_empty()
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{Point2, Vector2};
        use std::f64::consts::{FRAC_PI_2, PI};

        #[test]
        fn document_stores_entities() {
            let mut doc = Document::new();
            let id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));
            let circle_id = doc.add_circle(Point2::new(5.0, 5.0), 2.0);
            let arc_id = doc.add_arc(Point2::new(5.0, 0.0), 3.5, 0.0, FRAC_PI_2);
            let ellipse_id = doc.add_curve(Curve::Ellipse(Ellipse {
                center: Point2::new(15.0, 5.0),
                major_axis: Vector2::new(4.0, 0.0),
                ratio: 0.5,
                start_parameter: 0.0,
                end_parameter: PI,
            }));
            let polyline_id = doc.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(2.0, 2.0),
                    Point2::new(4.0, 0.0),
                ],
                true,
            );

            assert_eq!(id.get(), 0);
            assert_eq!(circle_id.get(), 1);
            assert_eq!(arc_id.get(), 2);
            assert_eq!(ellipse_id.get(), 3);
            assert_eq!(polyline_id.get(), 4);
            assert_eq!(doc.len(), 5);

            match doc.entity(arc_id) {
                Some(Entity::Arc(arc)) => {
                    assert!((arc.radius - 3.5).abs() < f64::EPSILON);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }

            match doc.entity(polyline_id) {
                Some(Entity::Polyline(polyline)) => {
                    assert!(polyline.is_closed);
                    assert_eq!(polyline.points().count(), 3);
                    assert!(polyline.vertices.iter().all(|v| v.bulge == 0.0));
                }
                _ => panic!("expected polyline entity"),
            }
        }

        #[test]
        fn query_by_kind_returns_detached_snapshot() {
            let mut doc = Document::new();
            let first = doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0));
            doc.add_circle(Point2::new(0.0, 0.0), 1.0);
            let second = doc.add_line(Point2::new(0.0, 0.0), Point2::new(0.0, 1.0));

            let lines = doc.query_by_kind(EntityKind::Line);
            assert_eq!(lines, vec![first, second]);

            for id in &lines {
                doc.add_polyline([Point2::new(0.0, 0.0)], false);
                assert!(doc.delete_entity(*id).is_some());
            }

            assert!(doc.query_by_kind(EntityKind::Line).is_empty());
            assert_eq!(doc.query_by_kind(EntityKind::Circle).len(), 1);
            assert_eq!(doc.polylines().count(), 2);
        }

        #[test]
        fn deleted_ids_are_not_reused() {
            let mut doc = Document::new();
            let id = doc.add_circle(Point2::new(0.0, 0.0), 1.0);
            assert!(matches!(doc.delete_entity(id), Some(Entity::Circle(_))));
            assert!(doc.delete_entity(id).is_none());
            assert!(doc.is_empty());

            let next = doc.add_circle(Point2::new(0.0, 0.0), 1.0);
            assert_ne!(id, next);
            assert_eq!(next.get(), 1);
        }

        #[test]
        fn entity_kind_names_follow_dxf() {
            assert_eq!(EntityKind::Line.to_string(), "LINE");
            assert_eq!(EntityKind::Curve.dxf_name(), "SPLINE");
            let entity = Entity::Polyline(Polyline {
                vertices: Vec::new(),
                is_closed: false,
            });
            assert_eq!(entity.kind(), EntityKind::Polyline);
        }
    }
}
