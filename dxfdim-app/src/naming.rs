use std::path::Path;

use dxfdim_engine::Dimensions;
use once_cell::sync::Lazy;
use regex::Regex;

/// Windows 文件名中不允许出现的字符。
static FORBIDDEN_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("非法字符正则应当有效"));

/// 把文件名中的非法字符逐个替换为 `_`。
pub fn sanitize_file_name(name: &str) -> String {
    FORBIDDEN_CHARS.replace_all(name, "_").into_owned()
}

/// 生成 `{stem}_{宽}x{高}{.ext}` 形式的目标文件名，保留原扩展名的大小写。
pub fn dimensioned_name(source: &Path, dimensions: Dimensions) -> String {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{stem}_{dimensions}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{dimensions}"),
    };
    sanitize_file_name(&name)
}
