mod reader;

pub use reader::*;

/// Whether `buf` looks like the start of a two column `<mz> <intensity>` text file
pub fn is_xy(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(first) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return false;
    };
    match split_columns(first) {
        Some((mz, intensity)) => mz.parse::<f64>().is_ok() && intensity.parse::<f64>().is_ok(),
        None => false,
    }
}

pub(crate) fn split_columns(line: &str) -> Option<(&str, &str)> {
    let mut columns = line.split_whitespace();
    let mz = columns.next()?;
    let intensity = columns.next()?;
    Some((mz, intensity))
}
