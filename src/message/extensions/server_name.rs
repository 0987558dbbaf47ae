use crate::util::all_consumed;
use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

const HOST_NAME: u8 = 0;

/// Server Name Indication, RFC 6066 3.
///
/// Only the `host_name` entry is read. Other name types are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerNameExtension<'a> {
    pub host_name: &'a str,
}

impl<'a> ServerNameExtension<'a> {
    pub fn new(host_name: &'a str) -> Self {
        ServerNameExtension { host_name }
    }

    pub fn parse(input: &'a [u8]) -> IResult<&'a [u8], ServerNameExtension<'a>> {
        let (input, list_len) = be_u16(input)?;
        let (input, mut list) = take(list_len)(input)?;

        let mut host_name = "";
        while !list.is_empty() {
            let (rest, name_type) = be_u8(list)?;
            let (rest, name_len) = be_u16(rest)?;
            let (rest, name) = take(name_len)(rest)?;
            if name_type == HOST_NAME && host_name.is_empty() {
                host_name = std::str::from_utf8(name)
                    .map_err(|_| Err::Failure(Error::new(name, ErrorKind::Char)))?;
            }
            list = rest;
        }
        all_consumed(list)?;

        Ok((input, ServerNameExtension { host_name }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let name = self.host_name.as_bytes();
        output.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
        output.push(HOST_NAME);
        output.extend_from_slice(&(name.len() as u16).to_be_bytes());
        output.extend_from_slice(name);
    }
}
