use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::types::Chunk;

/// Reads arbitrary byte ranges of a file as upload chunks.
///
/// Chunk sizes vary from one read to the next, so every read seeks
/// explicitly instead of following a cursor.
pub struct ChunkReader {
    file: File,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path).await?;
        let file_size = file.metadata().await?.len();
        Ok(Self { file, file_size })
    }

    /// Total file size in bytes at open time.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Reads `len` bytes starting at `start` as chunk number `index`.
    ///
    /// Fails with [`TransferError::SourceChanged`] when the range runs
    /// past the end of the file.
    pub async fn read_chunk(
        &mut self,
        index: u64,
        start: u64,
        len: u64,
    ) -> Result<Chunk, TransferError> {
        let end = start.saturating_add(len);
        if end > self.file_size {
            return Err(TransferError::SourceChanged {
                expected: end,
                actual: self.file_size,
            });
        }

        let mut data = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(start)).await?;
        match self.file.read_exact(&mut data).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                let actual = self.file.metadata().await?.len();
                return Err(TransferError::SourceChanged {
                    expected: end,
                    actual,
                });
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Chunk { index, start, data })
    }
}
