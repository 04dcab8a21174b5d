use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use dxfdim_core::{
    document::{Arc, Circle, Curve, Document, Ellipse, Entity, Line, Polyline, PolylineVertex, Spline},
    geometry::{Point2, Vector2},
};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

/// ASCII DXF 读取器。仅解析参与测量的几何实体，其余实体整体跳过。
#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 解析内存中的 DXF 文本。
    pub fn parse_str(&self, source: &str) -> Result<Document, IoError> {
        let parser = DxfParser::new(source);
        parser.parse().map_err(|DxfError { message }| IoError::InvalidDocument(message))
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        // 旧版 DXF 常以本地代码页保存，非 UTF-8 字节按替换字符处理，不影响数值字段。
        let data = String::from_utf8_lossy(&bytes);
        self.parse_str(&data)
    }
}

#[derive(Debug)]
struct DxfError {
    message: String,
}

impl DxfError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
    /// 当前实体是否带有图纸空间标记（组码 67 = 1）。
    paper_space: bool,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
            paper_space: false,
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                "POLYLINE" => {
                    // 旧式 POLYLINE 不参与测量，连同 VERTEX/SEQEND 一并跳过。
                    self.skip_entity_body()?;
                    self.skip_polyline_sequence()?;
                }
                kind => {
                    self.paper_space = false;
                    match self.parse_entity(kind)? {
                        // 只测量模型空间，图纸空间中的图框与视口忽略。
                        Some(_) if self.paper_space => {}
                        Some(entity) => {
                            document.add_entity(entity);
                        }
                        None => self.skip_entity_body()?,
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_entity(&mut self, kind: &str) -> Result<Option<Entity>, DxfError> {
        let entity = match kind {
            "LINE" => self.parse_line()?,
            "CIRCLE" => self.parse_circle()?,
            "ARC" => self.parse_arc()?,
            "ELLIPSE" => self.parse_ellipse()?,
            "LWPOLYLINE" => self.parse_lwpolyline()?,
            "SPLINE" => self.parse_spline()?,
            _ => return Ok(None),
        };
        Ok(Some(entity))
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        while let Some((code, value)) = self.next_entity_pair("LINE")? {
            match code {
                10 => assign_coord(&mut start_x, &value, "LINE 起点 X（组码 10）")?,
                20 => assign_coord(&mut start_y, &value, "LINE 起点 Y（组码 20）")?,
                11 => assign_coord(&mut end_x, &value, "LINE 终点 X（组码 11）")?,
                21 => assign_coord(&mut end_y, &value, "LINE 终点 Y（组码 21）")?,
                _ => {} // 图层、颜色与 Z 坐标不参与测量
            }
        }

        let sx = start_x.ok_or_else(|| DxfError::invalid("LINE 缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::invalid("LINE 缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::invalid("LINE 缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::invalid("LINE 缺少终点 Y（组码 21）"))?;

        Ok(Entity::Line(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
        }))
    }

    fn parse_circle(&mut self) -> Result<Entity, DxfError> {
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        while let Some((code, value)) = self.next_entity_pair("CIRCLE")? {
            match code {
                10 => assign_coord(&mut center_x, &value, "CIRCLE 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "CIRCLE 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "CIRCLE 半径（组码 40）")?,
                _ => {}
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("CIRCLE 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("CIRCLE 缺少半径（组码 40）"))?;

        Ok(Entity::Circle(Circle {
            center: Point2::new(cx, cy),
            radius,
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        while let Some((code, value)) = self.next_entity_pair("ARC")? {
            match code {
                10 => assign_coord(&mut center_x, &value, "ARC 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "ARC 圆心 Y（组码 20）")?,
                40 => assign_coord(&mut radius, &value, "ARC 半径（组码 40）")?,
                50 => assign_coord(&mut start_angle, &value, "ARC 起始角（组码 50）")?,
                51 => assign_coord(&mut end_angle, &value, "ARC 终止角（组码 51）")?,
                _ => {}
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ARC 缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::invalid("ARC 缺少半径（组码 40）"))?;
        let start_angle =
            start_angle.ok_or_else(|| DxfError::invalid("ARC 缺少起始角（组码 50）"))?;
        let end_angle = end_angle.ok_or_else(|| DxfError::invalid("ARC 缺少终止角（组码 51）"))?;

        // DXF 中角度以度为单位。
        Ok(Entity::Arc(Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle: start_angle.to_radians(),
            end_angle: end_angle.to_radians(),
        }))
    }

    /// 主轴长度或半径比异常时仍然载入，交由曲线离散阶段判定并跳过。
    fn parse_ellipse(&mut self) -> Result<Entity, DxfError> {
        let mut center_x = None;
        let mut center_y = None;
        let mut major_x = None;
        let mut major_y = None;
        let mut ratio = None;
        let mut start_parameter = None;
        let mut end_parameter = None;
        while let Some((code, value)) = self.next_entity_pair("ELLIPSE")? {
            match code {
                10 => assign_coord(&mut center_x, &value, "ELLIPSE 圆心 X（组码 10）")?,
                20 => assign_coord(&mut center_y, &value, "ELLIPSE 圆心 Y（组码 20）")?,
                11 => assign_coord(&mut major_x, &value, "ELLIPSE 主轴向量 X（组码 11）")?,
                21 => assign_coord(&mut major_y, &value, "ELLIPSE 主轴向量 Y（组码 21）")?,
                40 => assign_coord(&mut ratio, &value, "ELLIPSE 半径比（组码 40）")?,
                41 => assign_coord(&mut start_parameter, &value, "ELLIPSE 起始参数（组码 41）")?,
                42 => assign_coord(&mut end_parameter, &value, "ELLIPSE 终止参数（组码 42）")?,
                _ => {}
            }
        }

        let cx = center_x.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少圆心 Y（组码 20）"))?;
        let major_x =
            major_x.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 X（组码 11）"))?;
        let major_y =
            major_y.ok_or_else(|| DxfError::invalid("ELLIPSE 缺少主轴向量 Y（组码 21）"))?;

        Ok(Entity::Curve(Curve::Ellipse(Ellipse {
            center: Point2::new(cx, cy),
            major_axis: Vector2::new(major_x, major_y),
            ratio: ratio.unwrap_or(1.0),
            start_parameter: start_parameter.unwrap_or(0.0),
            end_parameter: end_parameter.unwrap_or(std::f64::consts::TAU),
        })))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        while let Some((code, value)) = self.next_entity_pair("LWPOLYLINE")? {
            match code {
                70 => {
                    let flag = parse_i32(&value, "LWPOLYLINE 标志")?;
                    is_closed = flag & 0x01 == 0x01;
                }
                10 => {
                    let x = parse_f64(&value, "LWPOLYLINE 顶点 X")?;
                    if let Some(y) = pending_y.take() {
                        vertices.push(PolylineVertex::new(Point2::new(x, y)));
                    } else if pending_x.replace(x).is_some() {
                        return Err(DxfError::invalid("LWPOLYLINE 顶点缺少对应的 Y（组码 20）"));
                    }
                }
                20 => {
                    let y = parse_f64(&value, "LWPOLYLINE 顶点 Y")?;
                    if let Some(x) = pending_x.take() {
                        vertices.push(PolylineVertex::new(Point2::new(x, y)));
                    } else if pending_y.replace(y).is_some() {
                        return Err(DxfError::invalid("LWPOLYLINE 顶点缺少对应的 X（组码 10）"));
                    }
                }
                42 => {
                    let bulge = parse_f64(&value, "LWPOLYLINE 顶点 bulge")?;
                    match vertices.last_mut() {
                        Some(vertex) => vertex.bulge = bulge,
                        None => {
                            return Err(DxfError::invalid(
                                "LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）",
                            ));
                        }
                    }
                }
                _ => {}
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::invalid(
                "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }

        Ok(Entity::Polyline(Polyline {
            vertices,
            is_closed,
        }))
    }

    fn parse_spline(&mut self) -> Result<Entity, DxfError> {
        let mut flags: i16 = 0;
        let mut degree: Option<i16> = None;
        let mut knot_values: Vec<f64> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();
        let mut control_points: Vec<Point2> = Vec::new();
        let mut fit_points: Vec<Point2> = Vec::new();
        let mut pending_control_x: Option<f64> = None;
        let mut pending_fit_x: Option<f64> = None;

        while let Some((code, value)) = self.next_entity_pair("SPLINE")? {
            match code {
                70 => flags = parse_i16(&value, "SPLINE 类型标志（组码 70）")?,
                71 => degree = Some(parse_i16(&value, "SPLINE 阶数（组码 71）")?),
                40 => knot_values.push(parse_f64(&value, "SPLINE 节点值（组码 40）")?),
                41 => weights.push(parse_f64(&value, "SPLINE 权重（组码 41）")?),
                10 => {
                    let x = parse_f64(&value, "SPLINE 控制点 X（组码 10）")?;
                    if pending_control_x.replace(x).is_some() {
                        return Err(DxfError::invalid(
                            "SPLINE 控制点 X（组码 10）在未提供 Y 之前重复出现",
                        ));
                    }
                }
                20 => {
                    let y = parse_f64(&value, "SPLINE 控制点 Y（组码 20）")?;
                    let x = pending_control_x.take().ok_or_else(|| {
                        DxfError::invalid("SPLINE 控制点 Y（组码 20）缺少对应的 X")
                    })?;
                    control_points.push(Point2::new(x, y));
                }
                11 => {
                    let x = parse_f64(&value, "SPLINE 拟合点 X（组码 11）")?;
                    if pending_fit_x.replace(x).is_some() {
                        return Err(DxfError::invalid(
                            "SPLINE 拟合点 X（组码 11）在未提供 Y 之前重复出现",
                        ));
                    }
                }
                21 => {
                    let y = parse_f64(&value, "SPLINE 拟合点 Y（组码 21）")?;
                    let x = pending_fit_x.take().ok_or_else(|| {
                        DxfError::invalid("SPLINE 拟合点 Y（组码 21）缺少对应的 X")
                    })?;
                    fit_points.push(Point2::new(x, y));
                }
                _ => {
                    // 计数（72/73/74）、公差、切向量、法向量与 Z 分量不参与测量
                }
            }
        }

        if let Some(x) = pending_control_x {
            return Err(DxfError::invalid(format!(
                "SPLINE 控制点 X={x} 缺少对应的 Y（组码 20）"
            )));
        }
        if let Some(x) = pending_fit_x {
            return Err(DxfError::invalid(format!(
                "SPLINE 拟合点 X={x} 缺少对应的 Y（组码 21）"
            )));
        }

        // 缺少阶数时按三次样条处理。
        let degree = i32::from(degree.unwrap_or(3));
        Ok(Entity::Curve(Curve::Spline(Spline {
            degree,
            is_closed: flags & 0x01 != 0,
            control_points,
            fit_points,
            knot_values,
            weights,
        })))
    }

    /// 读取实体内的下一个组码对；遇到组码 0 时回退并返回 None。
    fn next_entity_pair(&mut self, kind: &str) -> Result<Option<(i32, String)>, DxfError> {
        match self.reader.next_pair()? {
            Some((0, value)) => {
                self.reader.put_back((0, value));
                Ok(None)
            }
            Some((67, value)) => {
                let space = parse_i16(&value, &format!("{kind} 空间标记（组码 67）"))?;
                self.paper_space = space == 1;
                Ok(Some((67, value)))
            }
            Some(pair) => Ok(Some(pair)),
            None => Err(DxfError::invalid(format!("{kind} 未正确结束"))),
        }
    }

    fn skip_polyline_sequence(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => self.skip_entity_body()?,
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 容忍文件末尾的空行。
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        Ok(Some((code, value_line.to_string())))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "DXF pair 只能回退一次");
        self.buffer = Some(pair);
    }
}

fn assign_coord(slot: &mut Option<f64>, raw: &str, context: &str) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::invalid(format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, context)?);
    Ok(())
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DxfError::invalid(format!("{context} 不是有限数值（值：\"{raw}\"）")))
    }
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}
