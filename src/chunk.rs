use std::borrow::Cow;
use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::Error;

/// Values with a text form, accepted by the text operators and sinks.
///
/// Chunks are concatenated as bytes and decoded as UTF-8 once a piece of
/// text is complete, so a character may be split across two chunks.
///
/// Numbers, `u8` included, are written in decimal. Raw bytes are passed as
/// byte slices or `Vec<u8>`.
pub trait Chunk {
    /// Append the text form of `self` to `buf`.
    fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error>;
}

impl Chunk for str {
    fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl Chunk for [u8] {
    fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.extend_from_slice(self);
        Ok(())
    }
}

impl<const N: usize> Chunk for [u8; N] {
    fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.extend_from_slice(self);
        Ok(())
    }
}

impl Chunk for char {
    fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let mut tmp = [0; 4];
        buf.extend_from_slice(self.encode_utf8(&mut tmp).as_bytes());
        Ok(())
    }
}

impl<C: Chunk + ?Sized> Chunk for &C {
    fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        (**self).append_to(buf)
    }
}

impl<C: Chunk> Chunk for Option<C> {
    fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            Some(chunk) => chunk.append_to(buf),
            None => Err(Error::NotConvertible("None")),
        }
    }
}

macro_rules! deref_chunk {
    ($($ty:ty),* $(,)?) => {$(
        impl Chunk for $ty {
            fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
                (**self).append_to(buf)
            }
        }
    )*};
}

deref_chunk!(String, Box<str>, Rc<str>, Arc<str>, Cow<'_, str>, Vec<u8>, Box<[u8]>);

macro_rules! display_chunk {
    ($($ty:ty),* $(,)?) => {$(
        impl Chunk for $ty {
            fn append_to(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
                write!(buf, "{}", self)?;
                Ok(())
            }
        }
    )*};
}

display_chunk!(
    bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64
);
