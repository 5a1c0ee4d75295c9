use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use indicatif::ProgressStyle;
use regex::Regex;

/// 规范化为绝对路径，作为数据库里的唯一键
pub fn normalize_path(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

/// 规范化路径并转为字符串键
pub fn path_key(path: impl AsRef<Path>) -> io::Result<String> {
    Ok(normalize_path(path)?.to_string_lossy().into_owned())
}

/// 文件修改时间，毫秒级时间戳
pub fn modified_ms(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// 把逗号分隔的后缀列表编译成忽略大小写的完整匹配正则
pub fn suffix_regex(suffix: &str) -> Regex {
    let pattern = format!("(?i)^({})$", suffix.replace(',', "|"));
    Regex::new(&pattern).expect("failed to build regex")
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .expect("failed to build progress style")
    .progress_chars("=>-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_regex() {
        let re = suffix_regex("jpg,jpeg,png,webp");
        assert!(re.is_match("jpg"));
        assert!(re.is_match("JPEG"));
        assert!(re.is_match("Png"));
        assert!(!re.is_match("txt"));
        // 完整匹配，不接受子串
        assert!(!re.is_match("jpgx"));
    }

    #[test]
    fn test_normalize_path_is_absolute() {
        let p = normalize_path("some/relative/file.png").unwrap();
        assert!(p.is_absolute());
    }
}
