use crate::error::{Error, Result};

/// Forward-only cursor over a program image.
#[derive(Debug, Clone)]
pub struct ByteStream<'a> {
  buffer: &'a [u8],
  position: usize,
}

impl<'a> ByteStream<'a> {
  pub fn new(buffer: &'a [u8]) -> Self {
    ByteStream {
      buffer,
      position: 0,
    }
  }

  /// Starts reading at `position`, clamped to the end of the buffer.
  pub fn at(buffer: &'a [u8], position: usize) -> Self {
    ByteStream {
      buffer,
      position: position.min(buffer.len()),
    }
  }

  pub fn position(&self) -> usize {
    self.position
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn at_end(&self) -> bool {
    self.position >= self.buffer.len()
  }

  pub fn peek(&self, n: usize) -> Result<&'a [u8]> {
    let end = self.position.checked_add(n).filter(|&end| end <= self.buffer.len());
    match end {
      Some(end) => Ok(&self.buffer[self.position..end]),
      None => Err(Error::OutOfBounds {
        position: self.position,
        wanted: n,
        len: self.buffer.len(),
      }),
    }
  }

  pub fn advance(&mut self, n: usize) -> Result<()> {
    self.peek(n)?;
    self.position += n;
    Ok(())
  }

  /// Bytes between `start` and the current position.
  pub fn consumed_since(&self, start: usize) -> &'a [u8] {
    &self.buffer[start.min(self.position)..self.position]
  }

  pub fn read_u8(&mut self) -> Result<u8> {
    let byte = self.peek(1)?[0];
    self.position += 1;
    Ok(byte)
  }

  pub fn read_i8(&mut self) -> Result<i8> {
    self.read_u8().map(|byte| byte as i8)
  }

  pub fn read_u16(&mut self) -> Result<u16> {
    let bytes = self.peek(2)?;
    let word = u16::from_le_bytes([bytes[0], bytes[1]]);
    self.position += 2;
    Ok(word)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_reads_advance_position() {
    let mut stream = ByteStream::new(&[0x01, 0x34, 0x12, 0xff]);
    assert_eq!(stream.read_u8(), Ok(0x01));
    assert_eq!(stream.read_u16(), Ok(0x1234));
    assert_eq!(stream.read_i8(), Ok(-1));
    assert_eq!(stream.position(), 4);
    assert!(stream.at_end());
  }

  #[test]
  fn test_peek_does_not_move() {
    let stream = ByteStream::new(&[0xaa, 0xbb]);
    assert_eq!(stream.peek(2), Ok(&[0xaa, 0xbb][..]));
    assert_eq!(stream.position(), 0);
  }

  #[test]
  fn test_read_past_end_is_out_of_bounds() {
    let mut stream = ByteStream::at(&[0x00, 0x01, 0x02], 2);
    assert_eq!(
      stream.read_u16(),
      Err(Error::OutOfBounds {
        position: 2,
        wanted: 2,
        len: 3,
      })
    );
    assert_eq!(stream.position(), 2);
    assert!(stream.advance(2).is_err());
    assert_eq!(stream.advance(1), Ok(()));
    assert!(stream.at_end());
  }

  #[test]
  fn test_start_beyond_buffer_is_clamped() {
    let stream = ByteStream::at(&[0x90], 40);
    assert_eq!(stream.position(), 1);
    assert!(stream.at_end());
    assert_eq!(stream.peek(0), Ok(&[][..]));
  }

  #[test]
  fn test_consumed_since() {
    let mut stream = ByteStream::new(&[0xb8, 0x05, 0x00, 0x90]);
    stream.advance(3).unwrap();
    assert_eq!(stream.consumed_since(0), &[0xb8, 0x05, 0x00]);
  }
}
