//! 64 位指纹的汉明距离

/// 计算两个 64 位指纹的汉明距离
#[inline(always)]
pub fn hamming(va: u64, vb: u64) -> u32 {
    (va ^ vb).count_ones()
}

/// 计算两个 8 字节小端序指纹的汉明距离
///
/// 长度不足 8 字节的输入按 0 补齐，多余字节被忽略
#[inline(always)]
pub fn hamming_bytes(va: &[u8], vb: &[u8]) -> u32 {
    hamming(u64_from_bytes(va), u64_from_bytes(vb))
}

#[inline(always)]
fn u64_from_bytes(v: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = v.len().min(8);
    buf[..n].copy_from_slice(&v[..n]);
    u64::from_le_bytes(buf)
}
