//! PCM block type and the source/sink contract shared with file and device shells
//!
//! Every collaborator (WAV files, raw PCM pipes, capture devices) talks to the modem
//! only through [`BlockSource`] and [`BlockSink`].

use crate::error::Result;
use std::io::{ErrorKind, Read, Write};

/// One symbol's worth of mono signed 16-bit PCM. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlock {
    samples: Vec<i16>,
}

impl AudioBlock {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl From<Vec<i16>> for AudioBlock {
    fn from(samples: Vec<i16>) -> Self {
        Self::new(samples)
    }
}

impl AsRef<[i16]> for AudioBlock {
    fn as_ref(&self) -> &[i16] {
        &self.samples
    }
}

/// Produces the next block, or `None` once the stream is exhausted
pub trait BlockSource {
    fn next_block(&mut self) -> Result<Option<AudioBlock>>;
}

/// Consumes blocks in emission order
pub trait BlockSink {
    fn write_block(&mut self, block: &AudioBlock) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn next_block(&mut self) -> Result<Option<AudioBlock>> {
        (**self).next_block()
    }
}

impl<S: BlockSink + ?Sized> BlockSink for &mut S {
    fn write_block(&mut self, block: &AudioBlock) -> Result<()> {
        (**self).write_block(block)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl BlockSink for Vec<AudioBlock> {
    fn write_block(&mut self, block: &AudioBlock) -> Result<()> {
        self.push(block.clone());
        Ok(())
    }
}

/// Adapts any iterator of blocks into an infallible [`BlockSource`]
pub struct IterSource<I> {
    inner: I,
}

impl<I: Iterator<Item = AudioBlock>> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<I: Iterator<Item = AudioBlock>> BlockSource for IterSource<I> {
    fn next_block(&mut self) -> Result<Option<AudioBlock>> {
        Ok(self.inner.next())
    }
}

/// Reads raw little-endian i16 PCM from a byte stream, one block at a time
///
/// A trailing partial block at end of stream is dropped.
pub struct PcmReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: Read> PcmReader<R> {
    pub fn new(inner: R, samples_per_block: usize) -> Self {
        Self {
            inner,
            buf: vec![0u8; samples_per_block * 2],
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> BlockSource for PcmReader<R> {
    fn next_block(&mut self) -> Result<Option<AudioBlock>> {
        let mut filled = 0;
        while filled < self.buf.len() {
            match self.inner.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled < self.buf.len() {
            if filled > 0 {
                log::debug!("dropping trailing partial block of {} bytes", filled);
            }
            return Ok(None);
        }

        let samples = self
            .buf
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Some(AudioBlock::new(samples)))
    }
}

/// Writes blocks as raw little-endian i16 PCM
pub struct PcmWriter<W> {
    inner: W,
}

impl<W: Write> PcmWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> BlockSink for PcmWriter<W> {
    fn write_block(&mut self, block: &AudioBlock) -> Result<()> {
        let bytes: Vec<u8> = block
            .samples()
            .iter()
            .flat_map(|sample| sample.to_le_bytes())
            .collect();
        self.inner.write_all(&bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_pcm_writer_then_reader_preserves_blocks() {
        let blocks = vec![
            AudioBlock::new(vec![0, 1, -1, i16::MAX]),
            AudioBlock::new(vec![i16::MIN, 300, -300, 7]),
        ];

        let mut writer = PcmWriter::new(Vec::new());
        for block in &blocks {
            writer.write_block(block).unwrap();
        }
        let bytes = writer.into_inner();
        assert_eq!(bytes.len(), 16);

        let mut reader = PcmReader::new(Cursor::new(bytes), 4);
        assert_eq!(reader.next_block().unwrap(), Some(blocks[0].clone()));
        assert_eq!(reader.next_block().unwrap(), Some(blocks[1].clone()));
        assert_eq!(reader.next_block().unwrap(), None);
    }

    #[test]
    fn test_pcm_reader_drops_partial_tail() {
        // 1.5 blocks of 2 samples each
        let bytes = vec![1u8, 0, 2, 0, 3, 0];
        let mut reader = PcmReader::new(Cursor::new(bytes), 2);
        assert_eq!(reader.next_block().unwrap().unwrap().samples(), &[1, 2]);
        assert!(reader.next_block().unwrap().is_none());
    }

    #[test]
    fn test_pcm_writer_is_little_endian() {
        let mut writer = PcmWriter::new(Vec::new());
        writer.write_block(&AudioBlock::new(vec![0x0102])).unwrap();
        assert_eq!(writer.into_inner(), vec![0x02, 0x01]);
    }

    #[test]
    fn test_iter_source_yields_then_exhausts() {
        let mut source = IterSource::new(vec![AudioBlock::new(vec![5; 3])].into_iter());
        assert!(source.next_block().unwrap().is_some());
        assert!(source.next_block().unwrap().is_none());
    }
}
