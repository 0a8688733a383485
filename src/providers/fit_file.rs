//! Sample provider over one FIT file

use std::fmt;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

use crate::adapters::RecordAdapter;
use crate::fit::stream::open_file;
use crate::fit::{DecodeOptions, FitDecoder, StreamReader};
use crate::provider::SampleProvider;
use crate::{Result, RideSample};

/// One playback input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RideInput {
    /// FIT file on disk
    File(PathBuf),
    /// FIT bytes already in memory
    Memory { name: String, bytes: Vec<u8> },
}

impl RideInput {
    pub fn memory(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        RideInput::Memory { name: name.into(), bytes }
    }
}

impl From<PathBuf> for RideInput {
    fn from(path: PathBuf) -> Self {
        RideInput::File(path)
    }
}

impl fmt::Display for RideInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideInput::File(path) => write!(f, "{}", path.display()),
            RideInput::Memory { name, .. } => f.write_str(name),
        }
    }
}

/// Provider that decodes one FIT file and yields its `record` messages as samples
///
/// Every provider owns a fresh decoder, so local definitions never carry over between
/// inputs.
pub struct FitFileProvider {
    decoder: FitDecoder<Box<dyn Read + Send>>,
    name: String,
    samples: u64,
    untimed: u64,
}

impl FitFileProvider {
    /// Open an input for decoding. Only the file handle is acquired here; the header is read
    /// with the first call to [`SampleProvider::next_sample`].
    pub fn open(input: &RideInput, options: DecodeOptions) -> Result<Self> {
        let name = input.to_string();
        let stream: StreamReader<Box<dyn Read + Send>> = match input {
            RideInput::File(path) => {
                let (file, len) = open_file(path)?;
                StreamReader::new(Box::new(file) as Box<dyn Read + Send>, len).with_source(path.clone())
            }
            RideInput::Memory { bytes, .. } => {
                let len = bytes.len() as u64;
                StreamReader::new(Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>, len)
                    .with_source(name.clone())
            }
        };

        info!("Opened ride file: {}", name);
        Ok(Self { decoder: FitDecoder::from_stream(stream, options), name, samples: 0, untimed: 0 })
    }

    /// Samples yielded so far.
    pub fn samples_yielded(&self) -> u64 {
        self.samples
    }
}

#[async_trait::async_trait]
impl SampleProvider for FitFileProvider {
    async fn next_sample(&mut self) -> Result<Option<RideSample>> {
        while let Some(record) = self.decoder.next_record()? {
            if !RideSample::accepts(record.mesg_num) {
                trace!("Skipping mesg {} from {}", record.mesg_num, self.name);
                continue;
            }

            match RideSample::adapt(&record) {
                Some(sample) => {
                    self.samples += 1;
                    trace!("Sample {} from {}: t={}", self.samples, self.name, sample.timestamp);
                    return Ok(Some(sample));
                }
                None => {
                    self.untimed += 1;
                    warn!("Skipping record without timestamp in {}", self.name);
                }
            }
        }

        debug!(
            "Reached end of {} ({} samples, {} untimed records skipped)",
            self.name, self.samples, self.untimed
        );
        Ok(None)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
