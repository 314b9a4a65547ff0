//! Hosts-file parser.
//!
//! The parser is an explicit finite-state machine over raw bytes. Each line
//! is either a record (`a.b.c.d` followed by one or more hostnames) or is
//! ignored wholesale up to the next `\n`. Parsing stops at the first NUL byte
//! or at the end of the buffer, whichever comes first.
//!
//! Octets are accumulated without range validation and only their low eight
//! bits are kept, so `999` reads as `231`. Existing hosts files rely on this,
//! so it is kept as is.
//!
//! Bad records never fail the parse. Malformed lines are skipped silently;
//! hostnames that are too long or not UTF-8 are skipped and reported as a
//! [`ParseIssue`] so the caller can log them.

use std::fmt;
use std::net::Ipv4Addr;

/// Longest hostname accepted by default, in bytes.
pub const DEFAULT_MAX_HOSTNAME_LEN: usize = 511;

/// A single hostname-to-address record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostEntry {
    /// The hostname, case preserved.
    pub hostname: String,

    /// The redirection target.
    pub address: Ipv4Addr,
}

impl HostEntry {
    pub fn new(hostname: impl Into<String>, address: Ipv4Addr) -> Self {
        Self {
            hostname: hostname.into(),
            address,
        }
    }
}

/// A record the parser recognised but refused to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIssue {
    /// The hostname exceeded the configured maximum length.
    HostnameTooLong {
        address: Ipv4Addr,
        len: usize,
        max: usize,
    },

    /// The hostname bytes were not valid UTF-8.
    InvalidUtf8 { address: Ipv4Addr },
}

impl fmt::Display for ParseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseIssue::HostnameTooLong { address, len, max } => write!(
                f,
                "hostname for {} is {} bytes long (max {})",
                address, len, max
            ),
            ParseIssue::InvalidUtf8 { address } => {
                write!(f, "hostname for {} is not valid UTF-8", address)
            }
        }
    }
}

/// What a single transition produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing to report.
    Continue,
    /// A hostname boundary was reached and the entry is complete.
    Commit(HostEntry),
    /// A hostname boundary was reached but the record was rejected.
    Reject(ParseIssue),
}

/// Position of the state machine within the current line.
///
/// The address is accumulated as a 32-bit value with octet 1 in the low
/// byte, octet 4 in the high byte.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ParserState {
    /// Discarding everything up to the next newline.
    IgnoredLine,
    /// At the start of a line.
    #[default]
    BeginLine,
    /// Accumulating digits of octet `index` (1..=4).
    Octet { index: u8, address: u32, work: u32 },
    /// Just consumed the dot after octet `index` (1..=3).
    Dot { index: u8, address: u32 },
    /// Between the address and a hostname, or between two hostnames.
    Whitespace { address: u32 },
    /// Accumulating a hostname.
    HostName { address: u32, name: Vec<u8> },
    /// Consuming a hostname that already exceeded the maximum length.
    OverlongHostName { address: u32, len: usize },
}

impl ParserState {
    /// Advances the machine by one byte.
    pub fn step(self, byte: u8, max_hostname_len: usize) -> (ParserState, Step) {
        let next = match self {
            ParserState::IgnoredLine => {
                if byte == b'\n' {
                    ParserState::BeginLine
                } else {
                    ParserState::IgnoredLine
                }
            }
            ParserState::BeginLine => match digit(byte) {
                Some(d) => ParserState::Octet {
                    index: 1,
                    address: 0,
                    work: d,
                },
                None => ignore_rest_of_line(byte),
            },
            ParserState::Octet {
                index,
                address,
                work,
            } => {
                if let Some(d) = digit(byte) {
                    ParserState::Octet {
                        index,
                        address,
                        work: work.wrapping_mul(10).wrapping_add(d),
                    }
                } else if byte == b'.' && index < 4 {
                    ParserState::Dot {
                        index,
                        address: place_octet(address, index, work),
                    }
                } else if is_blank(byte) && index == 4 {
                    ParserState::Whitespace {
                        address: place_octet(address, index, work),
                    }
                } else {
                    ignore_rest_of_line(byte)
                }
            }
            ParserState::Dot { index, address } => match digit(byte) {
                Some(d) => ParserState::Octet {
                    index: index + 1,
                    address,
                    work: d,
                },
                None => ignore_rest_of_line(byte),
            },
            ParserState::Whitespace { address } => match byte {
                b'\n' => ParserState::BeginLine,
                b' ' | b'\t' | b'\r' => ParserState::Whitespace { address },
                _ if max_hostname_len == 0 => {
                    ParserState::OverlongHostName { address, len: 1 }
                }
                _ => ParserState::HostName {
                    address,
                    name: vec![byte],
                },
            },
            ParserState::HostName { address, mut name } => {
                if is_hostname_end(byte) {
                    return (after_hostname(byte, address), commit(address, name));
                }
                if name.len() >= max_hostname_len {
                    ParserState::OverlongHostName {
                        address,
                        len: name.len() + 1,
                    }
                } else {
                    name.push(byte);
                    ParserState::HostName { address, name }
                }
            }
            ParserState::OverlongHostName { address, len } => {
                if is_hostname_end(byte) {
                    let issue = ParseIssue::HostnameTooLong {
                        address: to_ipv4(address),
                        len,
                        max: max_hostname_len,
                    };
                    return (after_hostname(byte, address), Step::Reject(issue));
                }
                ParserState::OverlongHostName {
                    address,
                    len: len + 1,
                }
            }
        };

        (next, Step::Continue)
    }

    /// Handles end of input. Only a hostname in progress produces anything.
    pub fn finish(self, max_hostname_len: usize) -> Step {
        match self {
            ParserState::HostName { address, name } => commit(address, name),
            ParserState::OverlongHostName { address, len } => {
                Step::Reject(ParseIssue::HostnameTooLong {
                    address: to_ipv4(address),
                    len,
                    max: max_hostname_len,
                })
            }
            _ => Step::Continue,
        }
    }
}

/// Everything one parse produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Committed entries, in input order.
    pub entries: Vec<HostEntry>,

    /// Rejected records, in input order.
    pub issues: Vec<ParseIssue>,
}

impl ParseOutcome {
    fn record(&mut self, step: Step) {
        match step {
            Step::Continue => {}
            Step::Commit(entry) => self.entries.push(entry),
            Step::Reject(issue) => self.issues.push(issue),
        }
    }
}

/// Hosts-file parser with a bounded hostname length.
#[derive(Debug, Clone, Copy)]
pub struct HostsParser {
    max_hostname_len: usize,
}

impl Default for HostsParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HOSTNAME_LEN)
    }
}

impl HostsParser {
    /// Creates a parser that rejects hostnames longer than `max_hostname_len` bytes.
    pub fn new(max_hostname_len: usize) -> Self {
        Self { max_hostname_len }
    }

    pub fn max_hostname_len(&self) -> usize {
        self.max_hostname_len
    }

    /// Parses `buf` up to the first NUL byte or the end of the slice.
    pub fn parse(&self, buf: &[u8]) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        let mut state = ParserState::default();

        for &byte in buf.iter().take_while(|&&b| b != 0) {
            let (next, step) = state.step(byte, self.max_hostname_len);
            outcome.record(step);
            state = next;
        }
        outcome.record(state.finish(self.max_hostname_len));

        outcome
    }
}

/// Parses `buf` with the default hostname bound.
pub fn parse_hosts(buf: &[u8]) -> ParseOutcome {
    HostsParser::default().parse(buf)
}

fn digit(byte: u8) -> Option<u32> {
    byte.is_ascii_digit().then(|| u32::from(byte - b'0'))
}

fn is_blank(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

fn is_hostname_end(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

// A malformed line that ends on the offending byte must not swallow the next one.
fn ignore_rest_of_line(byte: u8) -> ParserState {
    if byte == b'\n' {
        ParserState::BeginLine
    } else {
        ParserState::IgnoredLine
    }
}

fn place_octet(address: u32, index: u8, work: u32) -> u32 {
    address | ((work & 0xFF) << (8 * u32::from(index - 1)))
}

fn to_ipv4(address: u32) -> Ipv4Addr {
    Ipv4Addr::from(address.to_le_bytes())
}

fn after_hostname(byte: u8, address: u32) -> ParserState {
    if byte == b'\n' {
        ParserState::BeginLine
    } else {
        ParserState::Whitespace { address }
    }
}

fn commit(address: u32, name: Vec<u8>) -> Step {
    let address = to_ipv4(address);
    match String::from_utf8(name) {
        Ok(hostname) => Step::Commit(HostEntry { hostname, address }),
        Err(_) => Step::Reject(ParseIssue::InvalidUtf8 { address }),
    }
}
