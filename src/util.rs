use std::io::{self, Read, Seek, SeekFrom};

/// Read until `buf` is full or the source is exhausted; returns bytes read.
pub fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Absolute end offset of a stream, leaving the cursor where it was.
pub fn stream_len<S: Seek>(s: &mut S) -> io::Result<u64> {
    let pos = s.stream_position()?;
    let end = s.seek(SeekFrom::End(0))?;
    s.seek(SeekFrom::Start(pos))?;
    Ok(end)
}

pub fn format_size(num: u64) -> String {
    let mut n = num as f64;
    for unit in ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "Zi"] {
        if n.abs() < 1024.0 {
            return format!("{:.1}{}B", n, unit);
        }
        n /= 1024.0;
    }
    format!("{:.1}YiB", n)
}

pub(crate) fn serialize_hex<T, S>(bytes: &T, s: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: serde::Serializer,
{
    s.serialize_str(&hex::encode(bytes.as_ref()))
}
