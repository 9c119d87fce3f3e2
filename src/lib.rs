//! # Bit Seek
//!
//! Read un-aligned bit fields, most significant bit first, from any `std::io::Read`.
//! If the source also implements `std::io::Seek`, the reader can be positioned
//! at an arbitrary bit offset.
//!
//! ```rust
//! use bitseek::{BitReader,Whence};
//! let mut br = BitReader::new(std::io::Cursor::new([0xAAu8,0x55]));
//! assert_eq!(br.read(3).unwrap(),0b101);
//! assert_eq!(br.buffered(),5);
//! br.seek(4,Whence::Start).unwrap();
//! assert_eq!(br.read(8).unwrap(),0xA5);
//! ```

pub mod reader;
pub mod stream;

pub use reader::BitReader;
pub use stream::Stream;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Bit Reader Errors
#[derive(thiserror::Error,Debug)]
pub enum Error {
    /// nothing could be read, the source was already exhausted
    #[error("end of stream")]
    EndOfStream,
    /// some bits were obtained before the source ran out
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("negative offset ({0})")]
    InvalidOffset(i64),
    #[error("offset out of range; max {max}, got {requested}")]
    OffsetOutOfRange { requested: i64, max: i64 },
    #[error("inaccurate offset after seek; expected {expected}, got {actual}")]
    InaccurateSeek { expected: i64, actual: i64 },
    #[error(transparent)]
    Io(#[from] std::io::Error)
}

/// Error from `BitReader::read_fields`, carries the fields that were read before the failure.
#[derive(thiserror::Error,Debug)]
#[error("{error} after {} fields", .fields.len())]
pub struct FieldsError {
    pub fields: Vec<u64>,
    #[source]
    pub error: Error
}

/// Reference point for a bit seek, the codes are the usual 0, 1, 2.
#[derive(FromPrimitive,Clone,Copy,Debug,PartialEq,Eq)]
pub enum Whence {
    Start = 0,
    Current = 1,
    End = 2
}

impl Whence {
    /// Convert a numeric whence code (0 = start, 1 = current, 2 = end)
    pub fn from_code(code: i64) -> Result<Self,Error> {
        match Whence::from_i64(code) {
            Some(whence) => Ok(whence),
            None => Err(Error::InvalidArgument(format!("invalid whence ({})",code)))
        }
    }
}

impl std::str::FromStr for Whence {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self,Error> {
        match s {
            "start" | "set" => Ok(Whence::Start),
            "current" | "cur" => Ok(Whence::Current),
            "end" => Ok(Whence::End),
            _ => match s.parse::<i64>() {
                Ok(code) => Whence::from_code(code),
                Err(_) => Err(Error::InvalidArgument(format!("invalid whence ({})",s)))
            }
        }
    }
}

#[test]
fn whence_codes() {
    assert_eq!(Whence::from_code(0).unwrap(),Whence::Start);
    assert_eq!(Whence::from_code(1).unwrap(),Whence::Current);
    assert_eq!(Whence::from_code(2).unwrap(),Whence::End);
    assert!(matches!(Whence::from_code(3),Err(Error::InvalidArgument(_))));
    assert!(matches!(Whence::from_code(-1),Err(Error::InvalidArgument(_))));
}

#[test]
fn whence_names() {
    assert_eq!("start".parse::<Whence>().unwrap(),Whence::Start);
    assert_eq!("cur".parse::<Whence>().unwrap(),Whence::Current);
    assert_eq!("2".parse::<Whence>().unwrap(),Whence::End);
    assert!("middle".parse::<Whence>().is_err());
}

#[test]
fn fields_error_message() {
    let err = FieldsError { fields: vec![1,2], error: Error::UnexpectedEndOfStream };
    assert_eq!(err.to_string(),"unexpected end of stream after 2 fields");
}
