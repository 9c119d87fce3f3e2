//! Bit Reader
//!
//! Reads fields of 0 to 64 bits, most significant bit first, from a byte source.
//! Bits left over from the last byte fetched are kept in a carry buffer, so the
//! source is only ever advanced by whole bytes.  When the source is also `Seek`,
//! the reader can jump to any bit offset, see `BitReader::seek`.

use std::io::{Read,Seek,SeekFrom,ErrorKind};
use num_traits::{PrimInt,Unsigned};
use crate::{Error,FieldsError,Whence};

/// maximum bits that can be returned by a single read
pub const MAX_BITS: u32 = 64;

/// mask selecting the low `n` bits of a byte, `n` must be in 0..=8
fn low_mask(n: u32) -> u8 {
    match n {
        0 => 0,
        8 => 0xff,
        n => (1u8 << n) - 1
    }
}

/// Reads bit fields from `source`.
/// The reader owns `source`, pass `&mut source` to keep ownership.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    source: R,
    /// bits left over from the last byte, held in the low order bits
    carry: u8,
    /// number of valid bits in `carry`, always 0..=7
    carry_count: u8
}

impl <R: Read> BitReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            carry: 0,
            carry_count: 0
        }
    }
    /// Number of bits held in the carry buffer, always in 0..=7.
    pub fn buffered(&self) -> u32 {
        self.carry_count as u32
    }
    pub fn get_ref(&self) -> &R {
        &self.source
    }
    /// Reading from the source directly will desynchronize the carry buffer.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }
    /// Discard the carry buffer and give back the source.
    pub fn into_inner(self) -> R {
        self.source
    }
    fn clear_carry(&mut self) {
        self.carry = 0;
        self.carry_count = 0;
    }
    /// Fill as much of `buf` as the source allows, returns the number of bytes obtained.
    /// Stops early only at end of stream.
    fn fetch(&mut self,buf: &mut [u8]) -> Result<usize,Error> {
        let mut got = 0;
        while got < buf.len() {
            match self.source.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind()==ErrorKind::Interrupted => {},
                Err(e) => return Err(Error::Io(e))
            }
        }
        Ok(got)
    }
    /// Read exactly `n` bits and return them as the low order bits of a `u64`.
    /// `n` can be 0 to 64, reading 0 bits never touches the source.
    /// If the source is exhausted before anything was obtained, the error is `EndOfStream`.
    /// If it runs out after some bits were obtained, the error is `UnexpectedEndOfStream`,
    /// and the bits obtained are lost.
    pub fn read(&mut self,n: u32) -> Result<u64,Error> {
        if n > MAX_BITS {
            return Err(Error::InvalidArgument(format!("cannot read {} bits, max is {}",n,MAX_BITS)));
        }
        let have = self.carry_count as u32;
        if n <= have {
            // the carry alone satisfies the request
            let rest = have - n;
            let ans = (self.carry >> rest) & low_mask(n);
            self.carry &= low_mask(rest);
            self.carry_count = rest as u8;
            return Ok(ans as u64);
        }
        let mut ans = self.carry as u64;
        let need = n - have;
        self.clear_carry();
        let full_bytes = (need / 8) as usize;
        let partial_bits = need % 8;
        let byte_count = full_bytes + match partial_bits { 0 => 0, _ => 1 };
        let mut buf: [u8;8] = [0;8];
        let got = self.fetch(&mut buf[0..byte_count])?;
        log::trace!("fetched {} of {} bytes for {} bits",got,byte_count,n);
        if got < byte_count {
            return match (got,have) {
                (0,0) => Err(Error::EndOfStream),
                _ => Err(Error::UnexpectedEndOfStream)
            };
        }
        for by in &buf[0..full_bytes] {
            ans = (ans << 8) | *by as u64;
        }
        if partial_bits > 0 {
            let last = buf[full_bytes];
            let rest = 8 - partial_bits;
            ans = (ans << partial_bits) | (last >> rest) as u64;
            self.carry = last & low_mask(rest);
            self.carry_count = rest as u8;
        }
        Ok(ans)
    }
    /// Read a single bit as a boolean.
    pub fn read_bit(&mut self) -> Result<bool,Error> {
        Ok(self.read(1)? == 1)
    }
    /// Read `n` bits into an unsigned primitive, `n` cannot exceed the width of `T`.
    pub fn read_as<T: PrimInt + Unsigned>(&mut self,n: u32) -> Result<T,Error> {
        let width = T::zero().count_zeros();
        if n > width {
            return Err(Error::InvalidArgument(format!("cannot read {} bits into {} bit type",n,width)));
        }
        let val = self.read(n)?;
        match <T as num_traits::NumCast>::from(val) {
            Some(ans) => Ok(ans),
            None => Err(Error::InvalidArgument(format!("{} does not fit in {} bits",val,width)))
        }
    }
    /// Read a sequence of fields with the given bit widths.
    /// An `EndOfStream` on the first field is passed through, but on any later
    /// field it becomes `UnexpectedEndOfStream`, since the record is truncated.
    /// The fields read before a failure are returned with the error.
    pub fn read_fields(&mut self,widths: &[u32]) -> Result<Vec<u64>,FieldsError> {
        let mut fields = Vec::with_capacity(widths.len());
        for (i,n) in widths.iter().enumerate() {
            match self.read(*n) {
                Ok(val) => fields.push(val),
                Err(Error::EndOfStream) if i > 0 => {
                    return Err(FieldsError { fields, error: Error::UnexpectedEndOfStream });
                },
                Err(error) => return Err(FieldsError { fields, error })
            }
        }
        Ok(fields)
    }
}

impl <R: Read + Seek> BitReader<R> {
    /// Current bit offset from the start of the source.
    /// If the source was moved behind the carry buffer, the offset comes out negative
    /// and is reported as `InvalidOffset`.
    pub fn position(&mut self) -> Result<u64,Error> {
        let byte_pos = self.source.stream_position()?;
        match byte_to_bit(byte_pos)?.checked_sub(self.carry_count as i64) {
            Some(bits) if bits >= 0 => Ok(bits as u64),
            Some(bits) => Err(Error::InvalidOffset(bits)),
            None => Err(Error::InvalidArgument(format!("byte position {} overflows bit offset",byte_pos)))
        }
    }
    /// absolute bit offset, can be negative, caller has to check
    fn absolute_offset(&mut self,bit_offset: i64,whence: Whence) -> Result<i64,Error> {
        let (base,name) = match whence {
            Whence::Start => return Ok(bit_offset),
            Whence::Current => {
                let byte_pos = self.source.stream_position()?;
                (byte_to_bit(byte_pos)?.checked_sub(self.carry_count as i64),"current")
            },
            Whence::End => {
                // measuring the end moves the source, put it back in case the target is rejected
                let byte_pos = self.source.stream_position()?;
                let byte_end = self.source.seek(SeekFrom::End(0))?;
                self.source.seek(SeekFrom::Start(byte_pos))?;
                (Some(byte_to_bit(byte_end)?),"end")
            }
        };
        match base.and_then(|b| b.checked_add(bit_offset)) {
            Some(abs) => Ok(abs),
            None => Err(Error::InvalidArgument(format!("offset {} from {} overflows",bit_offset,name)))
        }
    }
    /// Position the reader so the next read starts at the given bit offset, interpreted
    /// according to `whence`.  Returns the new absolute bit offset.
    /// If the target is not byte aligned the byte containing it is read immediately,
    /// so a target past the end is reported as `OffsetOutOfRange`.  A byte aligned target
    /// past the end is left to the source, the next read will report `EndOfStream`.
    /// A failed seek may leave the reader repositioned with an empty carry buffer.
    pub fn seek(&mut self,bit_offset: i64,whence: Whence) -> Result<u64,Error> {
        let abs = self.absolute_offset(bit_offset,whence)?;
        log::debug!("seek {} from {:?} resolves to bit {}",bit_offset,whence,abs);
        if abs < 0 {
            return Err(Error::InvalidOffset(abs));
        }
        self.clear_carry();
        let byte_count = abs / 8;
        let bit_count = (abs % 8) as u32;
        let byte_ret = self.source.seek(SeekFrom::Start(byte_count as u64))?;
        if bit_count != 0 {
            // read the byte containing the target and keep only the bits after it
            match self.read(8) {
                Ok(by) => {
                    self.carry = by as u8 & low_mask(8 - bit_count);
                    self.carry_count = (8 - bit_count) as u8;
                },
                Err(e) => {
                    log::debug!("byte at bit {} could not be read: {}",abs,e);
                    let byte_end = self.source.seek(SeekFrom::End(0))?;
                    return Err(Error::OffsetOutOfRange { requested: abs, max: byte_to_bit(byte_end)? });
                }
            }
        }
        let bit_ret = byte_to_bit(byte_ret)? + bit_count as i64;
        if bit_ret != abs {
            log::error!("seek landed on bit {} instead of {}",bit_ret,abs);
            return Err(Error::InaccurateSeek { expected: abs, actual: bit_ret });
        }
        Ok(bit_ret as u64)
    }
    /// Same as `seek`, with the reference point given as `std::io::SeekFrom`.
    pub fn seek_from(&mut self,pos: SeekFrom) -> Result<u64,Error> {
        match pos {
            SeekFrom::Start(offset) => match i64::try_from(offset) {
                Ok(offset) => self.seek(offset,Whence::Start),
                Err(_) => Err(Error::InvalidArgument(format!("offset {} is too large",offset)))
            },
            SeekFrom::Current(offset) => self.seek(offset,Whence::Current),
            SeekFrom::End(offset) => self.seek(offset,Whence::End)
        }
    }
}

/// convert a byte position to a signed bit position
fn byte_to_bit(byte_pos: u64) -> Result<i64,Error> {
    match i64::try_from(byte_pos).ok().and_then(|b| b.checked_mul(8)) {
        Some(bits) => Ok(bits),
        None => Err(Error::InvalidArgument(format!("byte position {} overflows bit offset",byte_pos)))
    }
}

// *************** TESTS *****************

#[cfg(test)]
fn reader(hex_str: &str) -> BitReader<std::io::Cursor<Vec<u8>>> {
    BitReader::new(std::io::Cursor::new(hex::decode(hex_str.replace(" ","")).unwrap()))
}

#[test]
fn reads_within_a_byte() {
    let cases: [(&str,&[u32],&[u64]);8] = [
        ("FF",&[3,3,2],&[0x7,0x7,0x3]),
        ("FF",&[1,1,1,1,1,1,1,1],&[1,1,1,1,1,1,1,1]),
        ("AA",&[1,1,1,1,1,1,1,1],&[1,0,1,0,1,0,1,0]),
        ("AA",&[3,3,2],&[0x5,0x2,0x2]),
        ("AA",&[5,3],&[0x15,0x2]),
        ("AA",&[7,1],&[0x55,0x0]),
        ("AA",&[6,2],&[0x2A,0x2]),
        ("AA",&[8],&[0xAA])
    ];
    for (data,widths,expected) in cases {
        let mut br = reader(data);
        for (n,val) in widths.iter().zip(expected.iter()) {
            assert_eq!(br.read(*n).unwrap(),*val,"reading {:?} from {}",widths,data);
        }
    }
}

#[test]
fn reads_across_bytes() {
    let mut br = reader("AA 55");
    assert_eq!(br.read(16).unwrap(),0xAA55);
    let mut br = reader("AA 55");
    assert_eq!(br.read(7).unwrap(),0x55);
    assert_eq!(br.read(8).unwrap(),0x2A);
    assert_eq!(br.read(1).unwrap(),0x1);
    let mut br = reader("AA 55");
    for val in [0x5,0x2,0x4,0x5,0x2,0x1] {
        let n = if val == 0x1 { 1 } else { 3 };
        assert_eq!(br.read(n).unwrap(),val);
    }
    let mut br = reader("AA 55 AA 55 AA 55 AA 55");
    assert_eq!(br.read(33).unwrap(),0x154AB54AB);
    assert_eq!(br.read(31).unwrap(),0x2A55AA55);
}

#[test]
fn reads_full_word() {
    let mut br = reader("01 23 45 67 89 AB CD EF FF");
    assert_eq!(br.read(64).unwrap(),0x0123456789ABCDEF);
    let mut br = reader("01 23 45 67 89 AB CD EF FF");
    assert_eq!(br.read(4).unwrap(),0x0);
    assert_eq!(br.read(64).unwrap(),0x123456789ABCDEFF);
    assert_eq!(br.buffered(),4);
}

#[test]
fn too_many_bits() {
    let mut br = reader("FF");
    assert!(matches!(br.read(65),Err(Error::InvalidArgument(_))));
    // nothing was consumed
    assert_eq!(br.read(8).unwrap(),0xFF);
}

#[test]
fn zero_bits() {
    let mut br = reader("");
    assert_eq!(br.read(0).unwrap(),0);
    let mut br = reader("FF");
    br.read(3).unwrap();
    assert_eq!(br.read(0).unwrap(),0);
    assert_eq!(br.buffered(),5);
    assert_eq!(br.get_ref().position(),1);
}

#[test]
fn end_of_stream() {
    let cases: [(&str,u32,Option<&str>);7] = [
        ("FF",8,None),
        ("FF",2,None),
        ("FF",9,Some("unexpected")),
        ("",1,Some("eof")),
        ("FF FF",16,None),
        ("FF FF",17,Some("unexpected")),
        ("ED D3 7E B6",33,Some("unexpected"))
    ];
    for (data,n,expected) in cases {
        let mut br = reader(data);
        match (br.read(n),expected) {
            (Ok(_),None) => {},
            (Err(Error::EndOfStream),Some("eof")) => {},
            (Err(Error::UnexpectedEndOfStream),Some("unexpected")) => {},
            (res,_) => panic!("reading {} from {}, expected {:?}, got {:?}",n,data,expected,res)
        }
    }
}

#[test]
fn one_bit_past_the_end() {
    // the final read window starts on a byte boundary
    let mut br = reader("FF");
    br.read(8).unwrap();
    assert!(matches!(br.read(1),Err(Error::EndOfStream)));
    // the final read window starts inside the last byte
    let mut br = reader("FF");
    br.read(7).unwrap();
    assert!(matches!(br.read(2),Err(Error::UnexpectedEndOfStream)));
}

#[test]
fn buffered_tracks_consumed_bits() {
    let data = hex::decode("DEADBEEF0123456789").unwrap();
    let mut br = BitReader::new(std::io::Cursor::new(&data));
    let mut consumed = 0;
    for n in [1,7,3,13,0,9,21,4,5] {
        br.read(n).unwrap();
        consumed += n;
        assert_eq!(br.buffered(),(8 - consumed % 8) % 8);
        assert_eq!(br.buffered(),br.buffered());
        assert!(br.buffered() <= 7);
    }
}

#[test]
fn partition_reproduces_bits() {
    let data = hex::decode("ED D3 7E B6 00 FF 5A C3 81 24 99".replace(" ","")).unwrap();
    let partitions: [&[u32];4] = [
        &[64,24],
        &[1,2,3,4,5,6,7,8,9,10,11,12,10],
        &[33,31,17,7],
        &[13,13,13,13,13,13,10]
    ];
    for widths in partitions {
        let mut br = BitReader::new(std::io::Cursor::new(&data));
        let mut bits = crate::Stream::new();
        for n in widths {
            bits.push_value(br.read(*n).unwrap(),*n).unwrap();
        }
        assert_eq!(bits,crate::Stream::from_bytes(&data),"partition {:?}",widths);
    }
}

#[test]
fn read_fields_works() {
    let mut br = reader("AA 55 AA 55 AA 55 AA 55");
    assert_eq!(br.read_fields(&[33,31]).unwrap(),vec![0x154AB54AB,0x2A55AA55]);
    let mut br = reader("FF");
    assert_eq!(br.read_fields(&[3,3,2]).unwrap(),vec![0x7,0x7,0x3]);
    let mut br = reader("FF");
    assert_eq!(br.read_fields(&[]).unwrap(),Vec::<u64>::new());
}

#[test]
fn read_fields_end_of_stream() {
    let mut br = reader("FF");
    assert_eq!(br.read_fields(&[1,7]).unwrap(),vec![1,0x7F]);
    let mut br = reader("");
    let err = br.read_fields(&[1,8]).unwrap_err();
    assert!(matches!(err.error,Error::EndOfStream));
    assert!(err.fields.is_empty());
    let mut br = reader("FF");
    let err = br.read_fields(&[8,8]).unwrap_err();
    assert!(matches!(err.error,Error::UnexpectedEndOfStream));
    assert_eq!(err.fields,vec![0xFF]);
    let mut br = reader("FF");
    let err = br.read_fields(&[1,8]).unwrap_err();
    assert!(matches!(err.error,Error::UnexpectedEndOfStream));
    assert_eq!(err.fields,vec![1]);
    let mut br = reader("FF");
    let err = br.read_fields(&[4,65]).unwrap_err();
    assert!(matches!(err.error,Error::InvalidArgument(_)));
    assert_eq!(err.fields,vec![0xF]);
}

#[test]
fn read_typed() {
    let mut br = reader("AB CD EF");
    assert!(br.read_bit().unwrap());
    assert_eq!(br.read_as::<u8>(7).unwrap(),0x2B);
    assert_eq!(br.read_as::<u16>(16).unwrap(),0xCDEF);
    let mut br = reader("AB CD EF");
    assert!(matches!(br.read_as::<u8>(9),Err(Error::InvalidArgument(_))));
    assert_eq!(br.read_as::<u32>(12).unwrap(),0xABC);
}

#[test]
fn io_errors_pass_through() {
    struct Broken;
    impl Read for Broken {
        fn read(&mut self,_buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::PermissionDenied,"denied"))
        }
    }
    let mut br = BitReader::new(Broken);
    match br.read(4) {
        Err(Error::Io(e)) => assert_eq!(e.kind(),ErrorKind::PermissionDenied),
        res => panic!("expected io error, got {:?}",res)
    }
}

#[test]
fn borrowed_source() {
    let mut src = std::io::Cursor::new(vec![0xF0u8,0x0F]);
    {
        let mut br = BitReader::new(&mut src);
        assert_eq!(br.read(12).unwrap(),0xF00);
    }
    // the carry is lost with the reader, the source advanced by whole bytes
    assert_eq!(src.position(),2);
}

#[test]
fn seek_start() {
    let mut br = reader("AA 55");
    assert_eq!(br.seek(4,Whence::Start).unwrap(),4);
    assert_eq!(br.buffered(),4);
    assert_eq!(br.read(8).unwrap(),0xA5);
    assert_eq!(br.seek(0,Whence::Start).unwrap(),0);
    assert_eq!(br.buffered(),0);
    assert_eq!(br.read(16).unwrap(),0xAA55);
    assert_eq!(br.seek(16,Whence::Start).unwrap(),16);
    assert!(matches!(br.read(1),Err(Error::EndOfStream)));
}

#[test]
fn seek_current_and_end() {
    let mut br = reader("AA 55");
    br.read(3).unwrap();
    assert_eq!(br.seek(2,Whence::Current).unwrap(),5);
    assert_eq!(br.read(3).unwrap(),0x2);
    assert_eq!(br.seek(-3,Whence::End).unwrap(),13);
    assert_eq!(br.read(3).unwrap(),0x5);
    assert_eq!(br.seek(-16,Whence::End).unwrap(),0);
    assert_eq!(br.position().unwrap(),0);
}

#[test]
fn seek_errors() {
    let mut br = reader("AA 55");
    br.read(5).unwrap();
    assert!(matches!(br.seek(-1,Whence::Start),Err(Error::InvalidOffset(-1))));
    // state is untouched by a negative offset
    assert_eq!(br.buffered(),3);
    assert!(matches!(br.seek(-6,Whence::Current),Err(Error::InvalidOffset(-1))));
    assert!(matches!(br.seek(-17,Whence::End),Err(Error::InvalidOffset(-1))));
    assert_eq!(br.position().unwrap(),5);
    assert_eq!(br.read(3).unwrap(),0x2);
    match br.seek(19,Whence::Start) {
        Err(Error::OffsetOutOfRange { requested, max }) => {
            assert_eq!(requested,19);
            assert_eq!(max,16);
        },
        res => panic!("expected out of range, got {:?}",res)
    }
    assert!(matches!(br.seek(1,Whence::End),Err(Error::OffsetOutOfRange { requested: 17, max: 16 })));
    assert!(matches!(br.seek(i64::MAX,Whence::End),Err(Error::InvalidArgument(_))));
}

#[test]
fn seek_round_trip() {
    let data = hex::decode("ED D3 7E".replace(" ","")).unwrap();
    let total = data.len() as i64 * 8;
    let mut br = BitReader::new(std::io::Cursor::new(&data));
    for x in 0..=total {
        for y in 0..=(total - x).min(64) {
            assert_eq!(br.seek(x,Whence::Start).unwrap(),x as u64);
            br.read(y as u32).unwrap();
            assert_eq!(br.seek(-y,Whence::Current).unwrap(),x as u64,"x={} y={}",x,y);
            assert_eq!(br.position().unwrap(),x as u64);
        }
    }
}

#[test]
fn seek_matches_sequential_reads() {
    let data = hex::decode("ED D3 7E B6".replace(" ","")).unwrap();
    let mut seq = BitReader::new(std::io::Cursor::new(&data));
    let mut br = BitReader::new(std::io::Cursor::new(&data));
    for x in 0..32 {
        let expected = seq.read(1).unwrap();
        br.seek(x,Whence::Start).unwrap();
        assert_eq!(br.read(1).unwrap(),expected,"bit {}",x);
    }
}

#[test]
fn seek_from_adapter() {
    let mut br = reader("AA 55");
    assert_eq!(br.seek_from(SeekFrom::Start(9)).unwrap(),9);
    assert_eq!(br.seek_from(SeekFrom::Current(-2)).unwrap(),7);
    assert_eq!(br.read(2).unwrap(),0x0);
    assert_eq!(br.seek_from(SeekFrom::End(-8)).unwrap(),8);
    assert_eq!(br.read(8).unwrap(),0x55);
    assert!(matches!(br.seek_from(SeekFrom::Start(u64::MAX)),Err(Error::InvalidArgument(_))));
}

#[cfg(test)]
/// reports a `SeekFrom::Start` landing one byte past where it really is
struct SkewedSeek(std::io::Cursor<Vec<u8>>);

#[cfg(test)]
impl Read for SkewedSeek {
    fn read(&mut self,buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

#[cfg(test)]
impl Seek for SkewedSeek {
    fn seek(&mut self,pos: SeekFrom) -> std::io::Result<u64> {
        let ans = self.0.seek(pos)?;
        match pos {
            SeekFrom::Start(_) => Ok(ans + 1),
            _ => Ok(ans)
        }
    }
}

#[test]
fn inaccurate_seek_is_reported() {
    let mut br = BitReader::new(SkewedSeek(std::io::Cursor::new(vec![0xAA,0x55,0xAA])));
    match br.seek(9,Whence::Start) {
        Err(Error::InaccurateSeek { expected, actual }) => {
            assert_eq!(expected,9);
            assert_eq!(actual,17);
        },
        res => panic!("expected inaccurate seek, got {:?}",res)
    }
    assert!(matches!(br.seek(0,Whence::Start),Err(Error::InaccurateSeek { expected: 0, actual: 8 })));
}

#[test]
fn failed_read_during_seek_is_out_of_range() {
    struct Unreadable(std::io::Cursor<Vec<u8>>);
    impl Read for Unreadable {
        fn read(&mut self,_buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(ErrorKind::Other,"unreadable"))
        }
    }
    impl Seek for Unreadable {
        fn seek(&mut self,pos: SeekFrom) -> std::io::Result<u64> {
            self.0.seek(pos)
        }
    }
    let mut br = BitReader::new(Unreadable(std::io::Cursor::new(vec![0xAA,0x55])));
    assert!(matches!(br.seek(3,Whence::Start),Err(Error::OffsetOutOfRange { requested: 3, max: 16 })));
    // aligned targets do not read
    assert_eq!(br.seek(8,Whence::Start).unwrap(),8);
}

#[test]
fn position_behind_carry() {
    let mut br = reader("AA 55");
    br.read(3).unwrap();
    assert_eq!(br.position().unwrap(),3);
    br.get_mut().set_position(0);
    assert!(matches!(br.position(),Err(Error::InvalidOffset(-5))));
}
