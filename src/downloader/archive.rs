use std::io::{Cursor, Write};

use anyhow::Result;
use zip::write::FileOptions;
use zip::ZipWriter;

/// Grows an in-memory zip archive one member at a time. Owned exclusively by
/// a download session in archive mode; serialized once when the session's
/// queue drains.
pub struct ZipBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    files: usize,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            files: 0,
        }
    }

    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.writer.start_file(name, FileOptions::default())?;
        self.writer.write_all(data)?;
        self.files += 1;
        Ok(())
    }

    pub fn files(&self) -> usize {
        self.files
    }

    /// Serializes the archive and returns the zip bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }
}

impl Default for ZipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn builds_a_readable_archive() {
        let mut builder = ZipBuilder::new();
        builder.add("a.png", b"first").unwrap();
        builder.add("b.jpg", b"second").unwrap();
        assert_eq!(builder.files(), 2);

        let bytes = builder.finish().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive
            .by_name("a.png")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first");
    }
}
