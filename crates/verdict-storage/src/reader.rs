//! Lazy iteration over a feedback log.

use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use verdict_core::errors::StoreError;
use verdict_core::models::FeedbackEvent;

use crate::frame::{FrameKind, FrameRead, FrameReader};

/// Lazy, restartable iterator over stored events in append order.
///
/// A frame whose body does not decode yields one `Corruption` item and
/// iteration continues with the next frame. A torn frame (short header or
/// body) yields one `Corruption` item and ends iteration; every record
/// before it has already been yielded.
pub struct FeedbackReader {
    path: PathBuf,
    frames: Option<FrameReader<BufReader<File>>>,
    recovered: usize,
    finished: bool,
}

impl FeedbackReader {
    pub(crate) fn open(path: &Path) -> Result<Self, StoreError> {
        let frames = match File::open(path) {
            Ok(file) => Some(FrameReader::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::io(path, e)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            frames,
            recovered: 0,
            finished: false,
        })
    }

    /// Restart from the first record.
    pub fn rewind(&mut self) -> Result<(), StoreError> {
        if let Some(frames) = self.frames.take() {
            let mut inner = frames.into_inner();
            inner
                .seek(SeekFrom::Start(0))
                .map_err(|e| StoreError::io(&self.path, e))?;
            self.frames = Some(FrameReader::new(inner));
        }
        self.recovered = 0;
        self.finished = false;
        Ok(())
    }

    /// Records successfully decoded so far.
    pub fn recovered(&self) -> usize {
        self.recovered
    }

    fn corruption(&self, offset: u64, details: String) -> StoreError {
        StoreError::Corruption {
            recovered: self.recovered,
            offset,
            details,
        }
    }
}

impl Iterator for FeedbackReader {
    type Item = Result<FeedbackEvent, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let frames = self.frames.as_mut()?;
        loop {
            let read = match frames.next_frame() {
                Ok(read) => read,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(StoreError::io(&self.path, e)));
                }
            };
            match read {
                FrameRead::End => {
                    self.finished = true;
                    return None;
                }
                FrameRead::Torn { offset, details } => {
                    self.finished = true;
                    tracing::warn!(
                        path = %self.path.display(),
                        offset,
                        recovered_records = self.recovered,
                        "torn frame in feedback log"
                    );
                    return Some(Err(self.corruption(offset, details)));
                }
                // Foreign frame kinds are skipped, not reported.
                FrameRead::Frame(frame) if frame.kind != FrameKind::Feedback => continue,
                FrameRead::Frame(frame) => {
                    return Some(match serde_json::from_slice::<FeedbackEvent>(&frame.body) {
                        Ok(event) => {
                            self.recovered += 1;
                            Ok(event)
                        }
                        Err(e) => Err(self.corruption(frame.offset, format!("undecodable body: {e}"))),
                    });
                }
            }
        }
    }
}
