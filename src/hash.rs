//! 感知哈希计算
//!
//! 每种算法对应一个固定的版本号，归一化尺寸和变换方式随版本固定，
//! 不同版本产生的指纹不可比较

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use image::DynamicImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hamming::hamming;

/// 64 位感知指纹
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn from_u64(v: u64) -> Self {
        Self(v)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// 转为小端序 8 字节，用于数据库 BLOB 存储
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    pub fn from_bytes(v: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        let n = v.len().min(8);
        buf[..n].copy_from_slice(&v[..n]);
        Self(u64::from_le_bytes(buf))
    }

    /// 两个指纹之间的汉明距离
    pub fn distance(self, other: Self) -> u32 {
        hamming(self.0, other.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u64::from_str_radix(s, 16)?))
    }
}

/// 哈希算法，版本号一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    /// 行梯度差值哈希，9x8 缩放
    Dhash,
    /// DCT 低频哈希，32x32 缩放取 8x8 低频块
    Phash,
}

/// dhash 的归一化尺寸
const DHASH_W: u32 = 9;
const DHASH_H: u32 = 8;
/// phash 的归一化尺寸与低频块边长
const PHASH_SIZE: u32 = 32;
const PHASH_BLOCK: usize = 8;

impl HashKind {
    /// 算法的版本号标签，随指纹一起持久化
    pub const fn version(self) -> u8 {
        match self {
            Self::Dhash => 1,
            Self::Phash => 2,
        }
    }

    pub fn from_version(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Dhash),
            2 => Some(Self::Phash),
            _ => None,
        }
    }

    /// 计算已解码图片的指纹
    ///
    /// 对相同像素和相同版本严格确定，不做任何 IO
    pub fn hash_image(self, img: &DynamicImage) -> Result<Fingerprint> {
        if img.width() == 0 || img.height() == 0 {
            return Err(Error::decode("<解码图像>", "图片宽或高为零"));
        }
        let hash = match self {
            Self::Dhash => d_hash(img),
            Self::Phash => p_hash(img),
        };
        Ok(Fingerprint(hash))
    }

    /// 解码内存中的图片数据并计算指纹
    pub fn hash_bytes(self, data: &[u8]) -> Result<Fingerprint> {
        let img = image::load_from_memory(data).map_err(|e| Error::decode("<内存数据>", e))?;
        self.hash_image(&img)
    }

    /// 读取并哈希一个图片文件
    pub fn hash_file(self, path: impl AsRef<Path>) -> Result<Fingerprint> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let img = image::load_from_memory(&data).map_err(|e| Error::decode(path, e))?;
        self.hash_image(&img).map_err(|_| Error::decode(path, "图片宽或高为零"))
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dhash => write!(f, "dhash"),
            Self::Phash => write!(f, "phash"),
        }
    }
}

/// 行梯度哈希：缩放为 9x8 灰度图，每行相邻像素两两比较得到 64 位
fn d_hash(img: &DynamicImage) -> u64 {
    let gray = image::imageops::resize(&img.to_luma8(), DHASH_W, DHASH_H, FilterType::Triangle);
    let data = gray.as_raw();

    let mut hash = 0u64;
    for row in data.chunks_exact(DHASH_W as usize) {
        for j in 0..(DHASH_W as usize - 1) {
            hash <<= 1;
            hash |= (row[j] < row[j + 1]) as u64;
        }
    }
    hash
}

/// DCT 低频哈希：缩放为 32x32 灰度图，二维 DCT-II 后取左上 8x8 低频块，
/// 以中位数为阈值二值化
fn p_hash(img: &DynamicImage) -> u64 {
    let n = PHASH_SIZE as usize;
    let gray = image::imageops::resize(&img.to_luma8(), PHASH_SIZE, PHASH_SIZE, FilterType::Triangle);
    let pixels: Vec<f64> = gray.as_raw().iter().map(|&p| p as f64).collect();

    let freq = dct_2d(&pixels, n);

    // 低频块按行优先展开，含直流分量
    let mut block = [0f64; PHASH_BLOCK * PHASH_BLOCK];
    for y in 0..PHASH_BLOCK {
        for x in 0..PHASH_BLOCK {
            block[y * PHASH_BLOCK + x] = freq[y * n + x];
        }
    }

    let mut sorted = block;
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = (sorted[mid - 1] + sorted[mid]) / 2.0;

    let mut hash = 0u64;
    for v in block {
        hash <<= 1;
        hash |= (v > median) as u64;
    }
    hash
}

/// 32 点 DCT-II 余弦表，cos_table[k * N + i] = cos(pi / N * (i + 0.5) * k)
static COS_TABLE: LazyLock<Vec<f64>> = LazyLock::new(|| {
    let n = PHASH_SIZE as usize;
    let mut table = vec![0f64; n * n];
    for k in 0..n {
        for i in 0..n {
            table[k * n + i] = (std::f64::consts::PI / n as f64 * (i as f64 + 0.5) * k as f64).cos();
        }
    }
    table
});

/// 对 n x n 矩阵先按行、再按列做一维 DCT-II
fn dct_2d(input: &[f64], n: usize) -> Vec<f64> {
    let mut rows = vec![0f64; n * n];
    for y in 0..n {
        dct_1d(&input[y * n..(y + 1) * n], &mut rows[y * n..(y + 1) * n], n);
    }

    let mut output = vec![0f64; n * n];
    let mut col_in = vec![0f64; n];
    let mut col_out = vec![0f64; n];
    for x in 0..n {
        for y in 0..n {
            col_in[y] = rows[y * n + x];
        }
        dct_1d(&col_in, &mut col_out, n);
        for y in 0..n {
            output[y * n + x] = col_out[y];
        }
    }
    output
}

fn dct_1d(input: &[f64], output: &mut [f64], n: usize) {
    for k in 0..n {
        let mut sum = 0f64;
        for (i, &v) in input.iter().enumerate() {
            sum += v * COS_TABLE[k * n + i];
        }
        output[k] = sum;
    }
}
