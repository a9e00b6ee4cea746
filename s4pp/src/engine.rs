//! Pure, transport-free pieces of the wire protocol: splitting a byte stream
//! into lines, parsing the lines the server sends, and building the lines
//! the client sends. None of this awaits anything, so it's exercised
//! directly in unit tests without a socket or a mock transport.

use heapless::String;

/// Maximum line length this crate accepts from the server. Generous enough
/// for a `NTFY:` line with several arguments; anything longer is a protocol
/// error rather than a buffer-sizing bug.
pub const MAX_LINE_LEN: usize = 256;

/// Splits a byte stream into complete `\n`-terminated lines, retaining a
/// trailing partial line across calls ("carry-over buffer").
pub struct LineReader {
    carry: String<MAX_LINE_LEN>,
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            carry: String::new(),
        }
    }

    /// Feed newly-received bytes and invoke `on_line` for each complete line
    /// found (the trailing `\n` is not included). Bytes after the last `\n`
    /// are kept for the next call. Returns an error if a single line (plus
    /// whatever was already carried) would overflow [`MAX_LINE_LEN`].
    pub fn feed(&mut self, bytes: &[u8], mut on_line: impl FnMut(&str)) -> Result<(), ()> {
        let mut start = 0;
        for (i, &byte) in bytes.iter().enumerate() {
            if byte == b'\n' {
                let chunk = core::str::from_utf8(&bytes[start..i]).map_err(|_| ())?;
                if self.carry.is_empty() {
                    on_line(chunk);
                } else {
                    self.carry.push_str(chunk).map_err(|_| ())?;
                    on_line(self.carry.as_str());
                    self.carry.clear();
                }
                start = i + 1;
            }
        }
        if start < bytes.len() {
            let chunk = core::str::from_utf8(&bytes[start..]).map_err(|_| ())?;
            self.carry.push_str(chunk).map_err(|_| ())?;
        }
        Ok(())
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed `S4PP/<major>.<minor> <algos> <max_samples>` hello line.
pub struct Hello<'a> {
    pub algos: &'a str,
    pub max_samples: u32,
}

pub fn parse_hello(line: &str) -> Result<Hello<'_>, &'static str> {
    let rest = line.strip_prefix("S4PP/").ok_or("bad hello")?;
    let mut parts = rest.splitn(3, ' ');
    let _version = parts.next().ok_or("bad hello")?;
    let algos = parts.next().ok_or("bad hello")?;
    let max_samples: u32 = parts
        .next()
        .ok_or("bad hello")?
        .parse()
        .map_err(|_| "bad hello")?;
    if !algos.split(',').any(|a| a == "SHA256") {
        return Err("no SHA256 support advertised");
    }
    if max_samples == 0 {
        return Err("zero max_samples");
    }
    Ok(Hello { algos, max_samples })
}

/// Parse a `TOK:<token>` line, returning the token text.
pub fn parse_tok(line: &str) -> Result<&str, &'static str> {
    line.strip_prefix("TOK:").ok_or("bad tok")
}

/// The server's reply to a committed sequence.
pub enum CommitReply<'a> {
    Ok { seqno: u32 },
    Nok { seqno: u32 },
    Rej { message: &'a str },
    Notify { rest: &'a str },
}

/// Parse one line as a commit reply or notification. Returns `Ok(None)` for
/// a line that's neither (the caller decides whether that's a protocol
/// error given its current state).
pub fn parse_server_line(line: &str) -> Result<Option<CommitReply<'_>>, &'static str> {
    if let Some(rest) = line.strip_prefix("OK:") {
        return Ok(Some(CommitReply::Ok {
            seqno: rest.parse().map_err(|_| "bad seqno")?,
        }));
    }
    if let Some(rest) = line.strip_prefix("NOK:") {
        return Ok(Some(CommitReply::Nok {
            seqno: rest.parse().map_err(|_| "bad seqno")?,
        }));
    }
    if let Some(message) = line.strip_prefix("REJ:") {
        return Ok(Some(CommitReply::Rej { message }));
    }
    if let Some(rest) = line.strip_prefix("NTFY:") {
        return Ok(Some(CommitReply::Notify { rest }));
    }
    Ok(None)
}

/// Build `AUTH:SHA256,<user>,<hex_hmac>\n` into a caller-owned buffer.
pub fn build_auth_line(user: &str, hex_hmac: &str, out: &mut String<MAX_LINE_LEN>) -> Result<(), ()> {
    out.clear();
    out.push_str("AUTH:SHA256,").map_err(|_| ())?;
    out.push_str(user).map_err(|_| ())?;
    out.push(',').map_err(|_| ())?;
    out.push_str(hex_hmac).map_err(|_| ())?;
    out.push('\n').map_err(|_| ())
}

/// Build `SEQ:<seqno>,0,1,0\n`.
pub fn build_seq_line(seqno: u32, out: &mut String<64>) -> Result<(), ()> {
    out.clear();
    core::fmt::write(out, format_args!("SEQ:{seqno},0,1,0\n")).map_err(|_| ())
}

/// Build `DICT:<index>,<unit>,<unitdiv>,<name>\n`.
pub fn build_dict_line(
    index: u32,
    unit: &str,
    unitdiv: &str,
    name: &str,
    out: &mut String<128>,
) -> Result<(), ()> {
    out.clear();
    core::fmt::write(
        out,
        format_args!("DICT:{index},{unit},{unitdiv},{name}\n"),
    )
    .map_err(|_| ())
}

/// Build `<index>,<delta_t>,<rendered>\n`.
pub fn build_data_line(index: u32, delta_t: i64, rendered: &str, out: &mut String<64>) -> Result<(), ()> {
    out.clear();
    core::fmt::write(out, format_args!("{index},{delta_t},{rendered}\n")).map_err(|_| ())
}

/// Build `SIG:<hex>\n`.
pub fn build_sig_line(hex_hmac: &str, out: &mut String<80>) -> Result<(), ()> {
    out.clear();
    out.push_str("SIG:").map_err(|_| ())?;
    out.push_str(hex_hmac).map_err(|_| ())?;
    out.push('\n').map_err(|_| ())
}
