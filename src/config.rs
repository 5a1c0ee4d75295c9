use std::convert::Infallible;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;
use crate::utils;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "", "simfind").expect("failed to get project dir");
    ConfDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_conf_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
#[command(name = "simfind", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 索引数据库所在目录
    #[arg(short, long, default_value = default_conf_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 为目录建立或更新感知哈希索引
    Index(IndexCommand),
    /// 用查询图片在已索引目录中搜索相似图片
    Search(SearchCommand),
    /// 查看索引统计信息，不带参数时列出所有索引库
    Stats(StatsCommand),
    /// 清空目录对应的索引记录
    Clean(CleanCommand),
}

/// 索引数据库所在目录
///
/// 每个被索引的根目录对应一个独立的数据库文件，
/// 文件名由目录名和路径摘要组成，避免同名目录冲突
#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub fn ensure_exists(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.path)
    }

    /// 返回 root 目录对应的数据库文件路径：`<目录名>_<路径摘要前 6 位>.db`
    pub fn database_for(&self, root: impl AsRef<Path>) -> io::Result<PathBuf> {
        let root = utils::normalize_path(root)?;
        let digest = blake3::hash(root.to_string_lossy().as_bytes()).to_hex();
        let name = root
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        Ok(self.path.join(format!("{}_{}.db", name, &digest[..6])))
    }

    /// 列出目录下所有索引数据库文件，按文件名排序
    pub fn databases(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.path) else {
            return vec![];
        };
        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|s| s == "db") == Some(true))
            .collect();
        files.sort();
        files
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
