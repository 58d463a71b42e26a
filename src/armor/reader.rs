use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;
use std::io::{self, BufRead, Read};
use std::str::{self, FromStr};

use base64::engine::{general_purpose::STANDARD, Engine as _};
use crc24::Crc24Hasher;
use log::debug;
use nom::{
    branch::alt,
    bytes::complete::{tag, take, take_until1},
    character::complete::{line_ending, not_line_ending, space0},
    combinator::{cut, eof, map_res, opt, value},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

use crate::errors::{bail, Error, Result};

/// Longest line accepted inside an armor block.
const MAX_LINE_LEN: u64 = 8 * 1024;

/// Armor block types.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum BlockType {
    /// PGP public key
    PublicKey,
    /// PGP private key
    PrivateKey,
    Message,
    Signature,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::PublicKey => f.write_str("PGP PUBLIC KEY BLOCK"),
            BlockType::PrivateKey => f.write_str("PGP PRIVATE KEY BLOCK"),
            BlockType::Message => f.write_str("PGP MESSAGE"),
            BlockType::Signature => f.write_str("PGP SIGNATURE"),
        }
    }
}

impl FromStr for BlockType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PGP PUBLIC KEY BLOCK" => Ok(BlockType::PublicKey),
            "PGP PRIVATE KEY BLOCK" => Ok(BlockType::PrivateKey),
            "PGP MESSAGE" => Ok(BlockType::Message),
            "PGP SIGNATURE" => Ok(BlockType::Signature),
            _ => Err(invalid_armor(format!("unknown armor type {s:?}"))),
        }
    }
}

/// Armor Headers.
pub type Headers = BTreeMap<String, Vec<String>>;

fn invalid_armor(message: impl Into<String>) -> Error {
    Error::InvalidArmor {
        message: message.into(),
    }
}

/// Checks whether the stream starts with text rather than a binary packet.
///
/// Binary packets always have the high bit of their first octet set.
pub fn is_armored<R: BufRead>(mut input: R) -> io::Result<bool> {
    let buf = input.fill_buf()?;
    Ok(buf.first().is_some_and(|b| b & 0x80 == 0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Header,
    Body,
    Done,
}

/// Streaming ascii armor decoding.
///
/// The decoded payload is produced line by line, so memory use does not
/// depend on the size of the armored block. The CRC-24 checksum, if present,
/// is verified once the footer is reached.
#[derive(derive_more::Debug)]
pub struct Dearmor<R: BufRead> {
    #[debug(skip)]
    inner: R,
    typ: Option<BlockType>,
    headers: Headers,
    part: Part,
    /// Base64 characters not yet forming a full quad.
    pending: Vec<u8>,
    #[debug("{} bytes", decoded.len() - pos)]
    decoded: Vec<u8>,
    pos: usize,
    #[debug(skip)]
    crc: Crc24Hasher,
    checksum: Option<u32>,
    #[debug(skip)]
    line: Vec<u8>,
}

impl<R: BufRead> Dearmor<R> {
    pub fn new(input: R) -> Self {
        Dearmor {
            inner: input,
            typ: None,
            headers: BTreeMap::new(),
            part: Part::Header,
            pending: Vec::with_capacity(4),
            decoded: Vec::new(),
            pos: 0,
            crc: Crc24Hasher::new(),
            checksum: None,
            line: Vec::with_capacity(128),
        }
    }

    /// The block type, available once the header has been read.
    pub fn typ(&self) -> Option<BlockType> {
        self.typ
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The checksum from the armor footer, if one was present.
    pub fn checksum(&self) -> Option<u32> {
        self.checksum
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads the armor header line and the armor headers.
    pub fn read_header(&mut self) -> Result<()> {
        if self.part != Part::Header {
            return Ok(());
        }

        // skip anything before the header line
        let typ = loop {
            if !self.next_line()? {
                return Err(invalid_armor("missing armor header line"));
            }
            match armor_header_line(&self.line) {
                Ok((_, typ)) => break typ,
                Err(nom::Err::Failure(_)) => {
                    return Err(invalid_armor(format!(
                        "invalid armor header line {:?}",
                        String::from_utf8_lossy(&self.line).trim_end()
                    )))
                }
                Err(_) => {}
            }
        };
        debug!("armor block {}", typ);
        self.typ = Some(typ);
        self.part = Part::Body;

        loop {
            if !self.next_line()? {
                return Err(invalid_armor("unexpected end of armor headers"));
            }
            if blank_line(&self.line).is_ok() {
                break;
            }

            let header = key_value_pair(&self.line)
                .ok()
                .map(|(_, (key, val))| (key.to_string(), val.trim_end().to_string()));
            match header {
                Some((key, val)) => self.headers.entry(key).or_default().push(val),
                None => {
                    // no separating empty line, the body starts right away
                    debug!("armor without header separator");
                    self.current_body_line()?;
                    break;
                }
            }
        }

        Ok(())
    }

    /// Reads the next line into `self.line`, returns false at EOF.
    fn next_line(&mut self) -> Result<bool> {
        self.line.clear();
        let read = (&mut self.inner)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut self.line)?;
        if read as u64 == MAX_LINE_LEN && self.line.last() != Some(&b'\n') {
            return Err(invalid_armor("armor line too long"));
        }

        Ok(read > 0)
    }

    /// Processes lines until decoded data is available or the footer was read.
    fn fill_decoded(&mut self) -> Result<()> {
        while self.pos >= self.decoded.len() && self.part == Part::Body {
            self.decoded.clear();
            self.pos = 0;

            if !self.next_line()? {
                return Err(invalid_armor("missing armor footer"));
            }
            self.current_body_line()?;
        }

        Ok(())
    }

    fn current_body_line(&mut self) -> Result<()> {
        let line = std::mem::take(&mut self.line);
        let res = self.body_line(&line);
        self.line = line;
        res
    }

    fn body_line(&mut self, line: &[u8]) -> Result<()> {
        if blank_line(line).is_ok() {
            return Ok(());
        }

        match armor_footer_line(line) {
            Ok((_, typ)) => return self.footer(typ),
            Err(nom::Err::Failure(_)) => return Err(invalid_armor("invalid armor footer line")),
            Err(_) => {}
        }

        match checksum_line(line) {
            Ok((_, checksum)) => {
                self.checksum = Some(checksum);
                return Ok(());
            }
            Err(nom::Err::Failure(_)) => {
                return Err(invalid_armor("invalid armor checksum line"))
            }
            Err(_) => {}
        }

        self.pending
            .extend(line.iter().copied().filter(|c| !c.is_ascii_whitespace()));
        let full = self.pending.len() - self.pending.len() % 4;
        if full > 0 {
            let chunk = STANDARD.decode(&self.pending[..full])?;
            self.pending.drain(..full);
            self.crc.write(&chunk);
            self.decoded.extend_from_slice(&chunk);
        }

        Ok(())
    }

    fn footer(&mut self, typ: BlockType) -> Result<()> {
        if Some(typ) != self.typ {
            return Err(invalid_armor(format!(
                "armor footer {} does not match the header",
                typ
            )));
        }
        if !self.pending.is_empty() {
            return Err(invalid_armor("truncated base64 data"));
        }
        if let Some(expected) = self.checksum {
            let actual = self.crc.finish() as u32;
            if expected != actual {
                return Err(Error::InvalidChecksum);
            }
        }

        self.part = Part::Done;
        Ok(())
    }
}

/// Trailing blanks, an optional line ending and nothing else.
fn line_end(i: &[u8]) -> IResult<&[u8], ()> {
    value((), (space0, opt(line_ending), eof)).parse(i)
}

fn blank_line(i: &[u8]) -> IResult<&[u8], ()> {
    preceded(space0, line_end).parse(i)
}

/// Parses a single ascii armor header separator.
fn armor_header_sep(i: &[u8]) -> IResult<&[u8], &[u8]> {
    tag(&b"-----"[..]).parse(i)
}

/// Parses the type inside of an armor header or footer line.
fn armor_header_type(i: &[u8]) -> IResult<&[u8], BlockType> {
    alt((
        value(BlockType::PublicKey, tag("PGP PUBLIC KEY BLOCK")),
        value(BlockType::PrivateKey, tag("PGP PRIVATE KEY BLOCK")),
        value(BlockType::Message, tag("PGP MESSAGE")),
        value(BlockType::Signature, tag("PGP SIGNATURE")),
    ))
    .parse(i)
}

/// Parses `-----BEGIN TYPE-----`. Unknown types are a failure, not a mismatch.
fn armor_header_line(i: &[u8]) -> IResult<&[u8], BlockType> {
    preceded(
        (space0, armor_header_sep, tag(&b"BEGIN "[..])),
        cut(terminated(armor_header_type, (armor_header_sep, line_end))),
    )
    .parse(i)
}

/// Parses `-----END TYPE-----`.
fn armor_footer_line(i: &[u8]) -> IResult<&[u8], BlockType> {
    preceded(
        (space0, armor_header_sep, tag(&b"END "[..])),
        cut(terminated(armor_header_type, (armor_header_sep, line_end))),
    )
    .parse(i)
}

/// Parses a single `Key: value` armor header, the value may be empty.
fn key_value_pair(i: &[u8]) -> IResult<&[u8], (&str, &str)> {
    (
        map_res(take_until1(":"), str::from_utf8),
        preceded(
            tag(&b":"[..]),
            alt((
                value("", line_end),
                delimited(
                    tag(&b" "[..]),
                    map_res(not_line_ending, str::from_utf8),
                    line_end,
                ),
            )),
        ),
    )
        .parse(i)
}

/// Parses the `=XXXX` checksum line.
fn checksum_line(i: &[u8]) -> IResult<&[u8], u32> {
    preceded(
        (space0, tag(&b"="[..])),
        cut(terminated(map_res(take(4usize), read_checksum), line_end)),
    )
    .parse(i)
}

/// Reads the checksum from its base64 encoding.
fn read_checksum(input: &[u8]) -> Result<u32> {
    let raw = STANDARD.decode(input)?;
    let [a, b, c] = raw[..] else {
        bail!("invalid checksum length {}", raw.len());
    };

    Ok(u32::from_be_bytes([0, a, b, c]))
}

impl<R: BufRead> BufRead for Dearmor<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.read_header()?;
        self.fill_decoded()?;

        Ok(&self.decoded[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.decoded.len());
    }
}

impl<R: BufRead> Read for Dearmor<R> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let buf = self.fill_buf()?;
        let len = buf.len().min(into.len());
        into[..len].copy_from_slice(&buf[..len]);
        self.consume(len);

        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SMALL: &str = "-----BEGIN PGP MESSAGE-----\n\
        Version: Test\n\
        Comment: first\n\
        Comment: second\n\
        \n\
        aGVsbG8g\n\
        d29ybGQ=\n\
        =sDy3\n\
        -----END PGP MESSAGE-----\n";

    fn decode(input: &str) -> Result<(Dearmor<&[u8]>, Vec<u8>)> {
        let mut dearmor = Dearmor::new(input.as_bytes());
        let mut out = Vec::new();
        dearmor.read_to_end(&mut out)?;
        Ok((dearmor, out))
    }

    #[test]
    fn test_dearmor_small() {
        let _ = pretty_env_logger::try_init();
        let (dearmor, out) = decode(SMALL).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(dearmor.typ(), Some(BlockType::Message));
        assert_eq!(
            dearmor.headers().get("Comment").unwrap(),
            &vec!["first".to_string(), "second".to_string()]
        );
        assert!(dearmor.checksum().is_some());
    }

    #[test]
    fn test_dearmor_crlf_and_leading_text() {
        let input = format!("some text first\r\n{}", SMALL.replace('\n', "\r\n"));
        let (_, out) = decode(&input).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn test_dearmor_bad_checksum() {
        let input = SMALL.replace("=sDy3", "=AAAA");
        let err = decode(&input).unwrap_err();
        assert!(err.to_string().contains("crc24"), "{}", err);
    }

    #[test]
    fn test_dearmor_missing_footer() {
        let input = SMALL.replace("-----END PGP MESSAGE-----\n", "");
        assert!(decode(&input).is_err());
    }

    #[test]
    fn test_dearmor_mismatched_footer() {
        let input = SMALL.replace("END PGP MESSAGE", "END PGP SIGNATURE");
        assert!(decode(&input).is_err());
    }

    #[test]
    fn test_armor_header_line() {
        assert_eq!(
            armor_header_line(b"-----BEGIN PGP MESSAGE-----\n").unwrap(),
            (&b""[..], BlockType::Message)
        );
        assert_eq!(
            armor_header_line(b"-----BEGIN PGP PUBLIC KEY BLOCK----- \r\n")
                .unwrap()
                .1,
            BlockType::PublicKey
        );
        assert!(matches!(
            armor_header_line(b"-----BEGIN PGP NONSENSE-----\n"),
            Err(nom::Err::Failure(_))
        ));
        assert!(matches!(
            armor_header_line(b"some text first\n"),
            Err(nom::Err::Error(_))
        ));
    }

    #[test]
    fn test_armor_footer_line() {
        assert_eq!(
            armor_footer_line(b"-----END PGP SIGNATURE-----").unwrap().1,
            BlockType::Signature
        );
        assert!(armor_footer_line(b"-----BEGIN PGP SIGNATURE-----\n").is_err());
    }

    #[test]
    fn test_key_value_pair() {
        assert_eq!(
            key_value_pair(b"Version: GnuPG v1\r\n").unwrap().1,
            ("Version", "GnuPG v1")
        );
        assert_eq!(key_value_pair(b"Comment:\n").unwrap().1, ("Comment", ""));
        assert!(key_value_pair(b"aGVsbG8g\n").is_err());
    }

    #[test]
    fn test_checksum_line() {
        assert_eq!(checksum_line(b"=sDy3\n").unwrap().1, 0xB0_3CB7);
        assert!(matches!(checksum_line(b"=AA==\n"), Err(nom::Err::Failure(_))));
        assert!(matches!(checksum_line(b"=sD\n"), Err(nom::Err::Failure(_))));
        assert!(matches!(checksum_line(b"aGVsbG8g\n"), Err(nom::Err::Error(_))));
    }

    #[test]
    fn test_dearmor_header_without_separator() {
        let input = SMALL.replace("Comment: second\n\n", "Comment: second\n");
        let (dearmor, out) = decode(&input).unwrap();
        assert_eq!(out, b"hello world");
        assert_eq!(dearmor.headers().get("Comment").unwrap().len(), 2);
    }

    #[test]
    fn test_is_armored() {
        assert!(is_armored(SMALL.as_bytes()).unwrap());
        assert!(!is_armored(&[0xC1u8, 0x00][..]).unwrap());
        assert!(!is_armored(&b""[..]).unwrap());
    }
}
