use std::ops::RangeFrom;

use nom::error::{make_error, ErrorKind, ParseError};
use nom::{Err, IResult, InputIter, InputLength, Parser, Slice};
use tinyvec::{Array, ArrayVec};

/// Like `nom::multi::many0` but collecting into a fixed capacity `ArrayVec`.
///
/// Input holding more items than fit fails with `ErrorKind::TooLarge`.
#[inline(always)]
pub fn many0<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    move |mut i: I| {
        let mut acc = ArrayVec::default();
        loop {
            let len = i.input_len();
            if len == 0 {
                return Ok((i, acc));
            }
            match f.parse(i.clone()) {
                Err(Err::Error(_)) => return Ok((i, acc)),
                Err(e) => return Err(e),
                Ok((i1, o)) => {
                    // infinite loop check: the parser must always consume
                    if i1.input_len() == len {
                        return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many0)));
                    }

                    if acc.try_push(o).is_some() {
                        return Err(Err::Failure(E::from_error_kind(i, ErrorKind::TooLarge)));
                    }
                    i = i1;
                }
            }
        }
    }
}

/// Like [`many0`] but requires at least one item.
#[inline(always)]
pub fn many1<I, O, E, F, A>(f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    let mut inner = many0(f);
    move |i: I| {
        let (rest, acc) = inner(i.clone())?;
        if acc.is_empty() {
            return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many1)));
        }
        Ok((rest, acc))
    }
}

pub fn be_u48<I, E: ParseError<I>>(input: I) -> IResult<I, u64, E>
where
    I: Slice<RangeFrom<usize>> + InputIter<Item = u8> + InputLength,
{
    let bound: usize = 6;

    if input.input_len() < bound {
        Err(Err::Error(make_error(input, ErrorKind::Eof)))
    } else {
        let mut res = 0u64;

        for byte in input.iter_elements().take(bound) {
            res = (res << 8) + byte as u64;
        }

        Ok((input.slice(bound..), res))
    }
}

/// Fail unless the sub-parser consumed all of a length-delimited block.
pub fn all_consumed(rest: &[u8]) -> Result<(), Err<nom::error::Error<&[u8]>>> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(Err::Failure(nom::error::Error::new(
            rest,
            ErrorKind::LengthValue,
        )))
    }
}

/// Write a 24 bit big endian length.
pub fn put_u24(output: &mut Vec<u8>, value: usize) {
    output.extend_from_slice(&(value as u32).to_be_bytes()[1..]);
}
