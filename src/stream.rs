//! In-memory bit sequence
//!
//! `Stream` holds bits in order, most significant bit of each byte first.  It is meant
//! for displaying bits and for building expected bit patterns, the `reader` module
//! does not depend on it.

use bit_vec::BitVec;
use crate::Error;

#[derive(Clone,Debug,Default,PartialEq,Eq)]
pub struct Stream {
    bits: BitVec
}

impl Stream {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new()
        }
    }
    /// Create a stream holding the bits of `buf`
    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            bits: BitVec::from_bytes(buf)
        }
    }
    /// Create a stream holding the low `n` bits of `value`, MSB first
    pub fn from_value(value: u64,n: u32) -> Result<Self,Error> {
        let mut ans = Self::new();
        ans.push_value(value,n)?;
        Ok(ans)
    }
    /// append the bits of `buf` to the end of the stream
    pub fn append_bytes(&mut self,buf: &[u8]) {
        self.bits.append(&mut BitVec::from_bytes(buf));
    }
    /// Append the low `n` bits of `value`, MSB first, `n` can be 0 to 64.
    pub fn push_value(&mut self,value: u64,n: u32) -> Result<(),Error> {
        if n > 64 {
            return Err(Error::InvalidArgument(format!("cannot push {} bits",n)));
        }
        for i in (0..n).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.bits.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
    pub fn get(&self,i: usize) -> Option<bool> {
        self.bits.get(i)
    }
    /// Interpret the bits as an unsigned integer, there can be no more than 64.
    pub fn to_u64(&self) -> Result<u64,Error> {
        if self.bits.len() > 64 {
            return Err(Error::InvalidArgument(format!("too many bits ({})",self.bits.len())));
        }
        Ok(self.bits.iter().fold(0,|acc,bit| (acc << 1) | bit as u64))
    }
}

/// Bits as 0 and 1, grouped by 8 with a space in between, e.g., `10101010 0101`
impl std::fmt::Display for Stream {
    fn fmt(&self,f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i,bit) in self.bits.iter().enumerate() {
            if i > 0 && i % 8 == 0 {
                write!(f," ")?;
            }
            write!(f,"{}",bit as u8)?;
        }
        Ok(())
    }
}

#[test]
fn display_groups_bytes() {
    assert_eq!(Stream::from_bytes(&[0xAA,0x55]).to_string(),"10101010 01010101");
    assert_eq!(Stream::from_bytes(&[0xFF]).to_string(),"11111111");
    assert_eq!(Stream::from_value(0x15,5).unwrap().to_string(),"10101");
    let mut bits = Stream::from_bytes(&[0x0F]);
    bits.push_value(0x1,1).unwrap();
    assert_eq!(bits.to_string(),"00001111 1");
    assert_eq!(Stream::new().to_string(),"");
}

#[test]
fn append_and_compare() {
    let mut bits = Stream::from_bytes(&[0xAA]);
    bits.append_bytes(&[0x55]);
    assert_eq!(bits,Stream::from_bytes(&[0xAA,0x55]));
    assert_eq!(bits,Stream::from_value(0xAA55,16).unwrap());
    assert_ne!(bits,Stream::from_value(0xAA55,17).unwrap());
    assert_eq!(bits.get(0),Some(true));
    assert_eq!(bits.get(1),Some(false));
    assert_eq!(bits.get(16),None);
    assert_eq!(Stream::new(),Stream::from_bytes(&[]));
    assert!(Stream::default().is_empty());
}

#[test]
fn integer_value() {
    let bits = Stream::from_bytes(&hex::decode("AA55AA55AA55AA55").unwrap());
    assert_eq!(bits.to_u64().unwrap(),0xAA55AA55AA55AA55);
    assert_eq!(Stream::from_value(0x154AB54AB,33).unwrap().to_u64().unwrap(),0x154AB54AB);
    assert_eq!(Stream::new().to_u64().unwrap(),0);
    let mut too_long = bits.clone();
    too_long.push_value(0,1).unwrap();
    assert_eq!(too_long.len(),65);
    assert!(matches!(too_long.to_u64(),Err(Error::InvalidArgument(_))));
    assert!(matches!(Stream::from_value(0,65),Err(Error::InvalidArgument(_))));
}
