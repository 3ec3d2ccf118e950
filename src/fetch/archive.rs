// src/fetch/archive.rs

use std::io::{Cursor, Read};
use tracing::trace;
use zip::ZipArchive;

use crate::error::{AcsError, Result};

/// Upper bound on the buffer reserved from a member's declared size; larger members
/// grow the buffer as they are read.
const MAX_PREALLOC: usize = 16 << 20;

fn prealloc_len(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |n| n.min(MAX_PREALLOC))
}

/// Extract one member of a ZIP archive held in memory.
///
/// The member is matched by exact name first, then by case-insensitive file name,
/// since the templates archives are not consistent about capitalisation or folders.
pub fn open_member(archive: &[u8], archive_name: &str, member: &str) -> Result<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;

    let name = if zip.index_for_name(member).is_some() {
        member.to_string()
    } else {
        let wanted = member.to_ascii_lowercase();
        zip.file_names()
            .find(|n| {
                n.rsplit('/')
                    .next()
                    .is_some_and(|base| base.to_ascii_lowercase() == wanted)
            })
            .map(str::to_string)
            .ok_or_else(|| {
                AcsError::malformed(archive_name, format!("archive has no member '{}'", member))
            })?
    };

    let mut entry = zip.by_name(&name)?;
    trace!(member = %name, size = entry.size(), "reading archive member");
    let mut buf = Vec::with_capacity(prealloc_len(entry.size()));
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::CompressionMethod;

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, data) in members {
            zip.start_file(*name, options).expect("start zip member");
            zip.write_all(data).expect("write zip member");
        }
        zip.finish().expect("finish zip");
    }
    buf
}
