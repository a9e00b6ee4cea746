//! The async upload driver: owns the session state machine and wires a
//! concrete [`Transport`] and [`SampleSource`] to the pure helpers in
//! [`crate::engine`].

use heapless::String;

use s4pp_transport::Transport;

use crate::fmt::{debug, warn};

use crate::buffer::PayloadBuffer;
use crate::dictionary::Dictionary;
use crate::engine::{
    self, build_auth_line, build_data_line, build_dict_line, build_seq_line, build_sig_line,
    CommitReply, LineReader,
};
use crate::error::S4ppError;
use crate::hmac::StreamingHmac;
use crate::render::render;
use crate::source::SampleSource;

/// Credentials and endpoint for an upload session.
pub struct Credentials<'a> {
    pub server: &'a str,
    pub port: u16,
    pub secure: bool,
    pub user: &'a str,
    pub key: &'a [u8],
}

/// Tunables for a single upload call.
pub struct UploadOptions {
    /// Bytes of `SEQ:`/`DICT:`/data/`SIG:` text per sequence before the
    /// engine closes it out, clamped to [`crate::buffer::MAX_PAYLOAD_CAPACITY`].
    pub payload_limit: usize,
    /// Maximum samples per sequence; `0` means no cap beyond the payload
    /// limit (the server's own `max_samples` is not separately enforced
    /// here — a `NOK`/`REJ` from an oversized sequence surfaces as a normal
    /// commit rejection).
    pub batch_size: u32,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            payload_limit: crate::buffer::MAX_PAYLOAD_CAPACITY,
            batch_size: 0,
        }
    }
}

/// At most this many built sequences may be sent to the transport awaiting
/// their `OK`/`NOK` before the engine stops buffering further ones. Replies
/// arrive in the order sequences were sent, so the oldest outstanding entry
/// is always the one a reply resolves.
const MAX_IN_FLIGHT: usize = 2;

/// One sequence already written to the transport, waiting on its reply.
struct InFlight {
    seqno: u32,
    in_sequence: u32,
    bytes: usize,
}

/// A built sequence ready to hand to the transport.
struct BuiltSequence {
    buffer: PayloadBuffer,
    in_sequence: u32,
}

/// Failure building a sequence, kept separate from [`S4ppError`] so the
/// builder doesn't need a transport error type parameter it never uses.
enum SequenceError<S> {
    Allocation,
    Iterator(S),
}

/// Protocol state, named to match the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Hello,
    Authed,
    Buffering,
    Committing,
    Done,
    Errored,
}

/// Outcome of an upload call: always carries the acknowledged count, even
/// on failure, mirroring the completion callback's `(error, count)` shape.
pub struct UploadReport<T, S> {
    pub acknowledged: u32,
    pub result: Result<(), S4ppError<T, S>>,
}

/// Run one upload session to completion: connect, authenticate, and drain
/// `source` in sequences until it signals end-of-data or a failure occurs.
pub async fn run_upload<Tp, Src>(
    transport: &mut Tp,
    credentials: &Credentials<'_>,
    options: &UploadOptions,
    source: &mut Src,
) -> UploadReport<Tp::Error, Src::Error>
where
    Tp: Transport,
    Src: SampleSource,
{
    if credentials.user.is_empty() || credentials.key.is_empty() || credentials.server.is_empty() {
        return UploadReport {
            acknowledged: 0,
            result: Err(S4ppError::Config("missing user, key, or server")),
        };
    }

    let mut state = State::Init;
    let mut acknowledged = 0u32;

    let result = drive(
        transport,
        credentials,
        options,
        source,
        &mut state,
        &mut acknowledged,
    )
    .await;

    let _ = transport.disconnect().await;
    let _ = state;

    UploadReport {
        acknowledged,
        result,
    }
}

async fn drive<Tp, Src>(
    transport: &mut Tp,
    credentials: &Credentials<'_>,
    options: &UploadOptions,
    source: &mut Src,
    state: &mut State,
    acknowledged: &mut u32,
) -> Result<(), S4ppError<Tp::Error, Src::Error>>
where
    Tp: Transport,
    Src: SampleSource,
{
    transport.connect().await.map_err(S4ppError::Transport)?;
    debug!("s4pp: connected, awaiting hello");

    let mut reader = LineReader::new();
    let mut read_buf = [0u8; 256];

    let hello_line = read_line(transport, &mut reader, &mut read_buf).await?;
    let hello = engine::parse_hello(&hello_line).map_err(S4ppError::Protocol)?;
    let _ = hello.max_samples;
    *state = State::Hello;

    let tok_line = read_line(transport, &mut reader, &mut read_buf).await?;
    let token = engine::parse_tok(&tok_line).map_err(S4ppError::Protocol)?;

    let auth_digest = one_shot_hmac(credentials.key, credentials.user.as_bytes(), token.as_bytes());
    let mut hex_buf = [0u8; 64];
    let auth_hex = crate::hex::encode(&auth_digest, &mut hex_buf);
    let mut auth_line: String<{crate::engine::MAX_LINE_LEN}> = String::new();
    build_auth_line(credentials.user, auth_hex, &mut auth_line).map_err(|_| S4ppError::Allocation)?;
    write_line(transport, auth_line.as_bytes()).await?;
    debug!("s4pp: authenticated");

    *state = State::Authed;

    let mut dictionary = Dictionary::new();
    let mut next_seqno = 0u32;
    let token_owned: String<128> = String::try_from(token).map_err(|_| S4ppError::Allocation)?;

    let mut pending: Option<crate::source::UploadSample> =
        source.next().map_err(S4ppError::Iterator)?;

    let payload_limit = options.payload_limit.min(crate::buffer::MAX_PAYLOAD_CAPACITY);

    // Up to MAX_IN_FLIGHT built sequences may sit on the transport awaiting
    // a reply at once; commits themselves stay strictly serialized (replies
    // are read and matched one at a time, oldest first) so a NOK always
    // identifies exactly one outstanding sequence unambiguously.
    let mut in_flight: heapless::Deque<InFlight, MAX_IN_FLIGHT> = heapless::Deque::new();
    let mut bytes_queued: usize = 0;
    let mut bytes_acknowledged: usize = 0;

    loop {
        while in_flight.len() < MAX_IN_FLIGHT && pending.is_some() {
            *state = State::Buffering;
            let (built, _end_of_data) = build_sequence(
                source,
                &mut dictionary,
                credentials.key,
                token_owned.as_str(),
                next_seqno,
                payload_limit,
                options.batch_size,
                &mut pending,
            )
            .map_err(|err| match err {
                SequenceError::Allocation => S4ppError::Allocation,
                SequenceError::Iterator(e) => S4ppError::Iterator(e),
            })?;

            *state = State::Committing;
            let bytes = built.buffer.len();
            write_line(transport, built.buffer.as_bytes()).await?;
            bytes_queued += bytes;
            debug!(
                "s4pp: sequence {} sent, {} samples ({} bytes queued, {} acknowledged)",
                next_seqno, built.in_sequence, bytes_queued, bytes_acknowledged
            );

            in_flight
                .push_back(InFlight {
                    seqno: next_seqno,
                    in_sequence: built.in_sequence,
                    bytes,
                })
                .map_err(|_| S4ppError::Allocation)?;
            next_seqno += 1;
        }

        if in_flight.is_empty() {
            *state = State::Done;
            return Ok(());
        }

        let reply_line = read_line(transport, &mut reader, &mut read_buf).await?;
        match engine::parse_server_line(&reply_line).map_err(S4ppError::Protocol)? {
            Some(CommitReply::Ok { seqno }) => {
                let front = in_flight
                    .pop_front()
                    .ok_or(S4ppError::Protocol("OK with no outstanding sequence"))?;
                if seqno != front.seqno {
                    *state = State::Errored;
                    return Err(S4ppError::Protocol("OK seqno does not match outstanding sequence"));
                }
                *acknowledged += front.in_sequence;
                bytes_acknowledged += front.bytes;
                if in_flight.is_empty() && pending.is_none() {
                    *state = State::Done;
                    return Ok(());
                }
                *state = State::Authed;
            }
            Some(CommitReply::Nok { .. }) | Some(CommitReply::Rej { .. }) => {
                let rejected = in_flight.front().map(|f| f.seqno).unwrap_or(next_seqno);
                warn!("s4pp: sequence {} rejected by server", rejected);
                *state = State::Errored;
                return Err(S4ppError::CommitRejected);
            }
            Some(CommitReply::Notify { .. }) => {
                *state = State::Errored;
                return Err(S4ppError::Protocol("unexpected notification before commit reply"));
            }
            None => {
                *state = State::Errored;
                return Err(S4ppError::Protocol("unexpected response"));
            }
        }
    }
}

/// Build one sequence's wire payload: a `SEQ:` line, one `DICT:`/data line
/// pair per sample (dictionary entries only on first use of a tag), and a
/// closing `SIG:` line, stopping once the payload limit, the batch size, or
/// the source itself is exhausted. Returns whether the source is now fully
/// drained.
#[allow(clippy::too_many_arguments)]
fn build_sequence<Src: SampleSource>(
    source: &mut Src,
    dictionary: &mut Dictionary,
    key: &[u8],
    token: &str,
    seqno: u32,
    payload_limit: usize,
    batch_size: u32,
    pending: &mut Option<crate::source::UploadSample>,
) -> Result<(BuiltSequence, bool), SequenceError<Src::Error>> {
    let mut seq_hmac = StreamingHmac::new(key);
    seq_hmac.restart(token.as_bytes());

    let mut buffer = PayloadBuffer::new(payload_limit);

    let mut seq_line: String<64> = String::new();
    build_seq_line(seqno, &mut seq_line).map_err(|_| SequenceError::Allocation)?;
    if !buffer.push_line(&seq_line) {
        return Err(SequenceError::Allocation);
    }
    seq_hmac.update(seq_line.as_bytes());

    let mut last_time: i64 = 0;
    let mut in_sequence = 0u32;
    let end_of_data;

    loop {
        let Some(sample) = pending.take() else {
            end_of_data = true;
            break;
        };

        // Look up without registering: a tag must only be assigned an index
        // once its DICT line (if any) has actually been buffered, or a
        // deferred sample would come back around already "known" with its
        // DICT line never sent.
        let known = dictionary.get(&sample.name);
        let index = known.unwrap_or_else(|| dictionary.next_index());

        let mut dict_line: String<128> = String::new();
        if known.is_none() {
            build_dict_line(index, &sample.unit, &sample.unitdiv, &sample.name, &mut dict_line)
                .map_err(|_| SequenceError::Allocation)?;
        }

        let delta_t = sample.time - last_time;
        let rendered = render(sample.value, sample.decimals);
        let mut data_line: String<64> = String::new();
        build_data_line(index, delta_t, &rendered, &mut data_line)
            .map_err(|_| SequenceError::Allocation)?;

        if buffer.at_limit(dict_line.len() + data_line.len()) {
            if in_sequence == 0 {
                // Not even one sample fits under the configured limit;
                // retrying would just repeat this forever.
                return Err(SequenceError::Allocation);
            }
            *pending = Some(sample);
            end_of_data = false;
            break;
        }

        if known.is_none() {
            dictionary
                .insert(&sample.name)
                .map_err(|_| SequenceError::Allocation)?;
            buffer.push_line(&dict_line);
            seq_hmac.update(dict_line.as_bytes());
        }
        buffer.push_line(&data_line);
        seq_hmac.update(data_line.as_bytes());

        last_time = sample.time;
        in_sequence += 1;

        let batch_full = batch_size != 0 && in_sequence >= batch_size;
        let next = source.next().map_err(SequenceError::Iterator)?;
        if next.is_none() {
            *pending = None;
            end_of_data = true;
            break;
        }
        *pending = next;
        if batch_full {
            end_of_data = false;
            break;
        }
    }

    let sig_digest = seq_hmac.finalize();
    let mut sig_hex_buf = [0u8; 64];
    let sig_hex = crate::hex::encode(&sig_digest, &mut sig_hex_buf);
    let mut sig_line: String<80> = String::new();
    build_sig_line(sig_hex, &mut sig_line).map_err(|_| SequenceError::Allocation)?;
    if !buffer.push_line(&sig_line) {
        return Err(SequenceError::Allocation);
    }

    Ok((BuiltSequence { buffer, in_sequence }, end_of_data))
}

/// One-shot `HMAC-SHA256(key, a || b)`, used for the `AUTH:` line (the
/// per-sequence `SIG:` HMAC reuses the same [`StreamingHmac`] type but
/// stays seeded with the token across many `update` calls instead).
fn one_shot_hmac(key: &[u8], a: &[u8], b: &[u8]) -> [u8; 32] {
    let mut hmac = StreamingHmac::new(key);
    hmac.restart(&[]);
    hmac.update(a);
    hmac.update(b);
    hmac.finalize()
}

async fn read_line<Tp: Transport, S>(
    transport: &mut Tp,
    reader: &mut LineReader,
    read_buf: &mut [u8],
) -> Result<String<{crate::engine::MAX_LINE_LEN}>, S4ppError<Tp::Error, S>> {
    loop {
        let n = transport
            .read(read_buf)
            .await
            .map_err(S4ppError::Transport)?;
        if n == 0 {
            return Err(S4ppError::Protocol("unexpected disconnect"));
        }
        let mut found: Option<String<{crate::engine::MAX_LINE_LEN}>> = None;
        reader
            .feed(&read_buf[..n], |line| {
                if found.is_none() {
                    found = String::try_from(line).ok();
                }
            })
            .map_err(|_| S4ppError::Protocol("missing newline"))?;
        if let Some(line) = found {
            return Ok(line);
        }
    }
}

async fn write_line<Tp: Transport, E>(
    transport: &mut Tp,
    bytes: &[u8],
) -> Result<(), S4ppError<Tp::Error, E>> {
    s4pp_transport::write_all(transport, bytes)
        .await
        .map_err(S4ppError::Transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SliceSource, UploadSample};
    use s4pp_transport::mock::Loopback;

    fn sample(name: &str, time: i64, value: i32, decimals: u8) -> UploadSample {
        UploadSample {
            name: heapless::String::try_from(name).unwrap(),
            unit: heapless::String::new(),
            unitdiv: heapless::String::try_from("1").unwrap(),
            time,
            value,
            decimals,
        }
    }

    async fn wait_for_sent(server: &s4pp_transport::mock::LoopbackServer, marker: &[u8]) -> Vec<u8> {
        let mut received = Vec::new();
        loop {
            received.extend(server.take_sent());
            if received.windows(marker.len()).any(|w| w == marker) {
                return received;
            }
            tokio::task::yield_now().await;
        }
    }

    async fn wait_for_n_sig_lines(server: &s4pp_transport::mock::LoopbackServer, n: usize) -> Vec<u8> {
        let mut received = Vec::new();
        loop {
            received.extend(server.take_sent());
            if received.windows(4).filter(|w| *w == b"SIG:").count() >= n {
                return received;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn authoritative_upload_acknowledges_one_sample() {
        let (mut client, server) = Loopback::pair();
        server.send(b"S4PP/1.0 SHA256 100\nTOK:abc\n");

        let server_task = tokio::spawn(async move {
            wait_for_sent(&server, b"SIG:").await;
            server.send(b"OK:0\n");
        });

        let samples = [sample("T", 2000, 230, 1)];
        let mut source = SliceSource::new(&samples);
        let credentials = Credentials {
            server: "host",
            port: 22226,
            secure: false,
            user: "user",
            key: b"secret",
        };
        let report = run_upload(
            &mut client,
            &credentials,
            &UploadOptions::default(),
            &mut source,
        )
        .await;

        server_task.await.unwrap();
        assert!(report.result.is_ok());
        assert_eq!(report.acknowledged, 1);
    }

    #[tokio::test]
    async fn commit_reject_acknowledges_nothing() {
        let (mut client, server) = Loopback::pair();
        server.send(b"S4PP/1.0 SHA256 100\nTOK:abc\n");

        let server_task = tokio::spawn(async move {
            wait_for_sent(&server, b"SIG:").await;
            server.send(b"NOK:0\n");
        });

        let samples = [sample("T", 2000, 230, 1)];
        let mut source = SliceSource::new(&samples);
        let credentials = Credentials {
            server: "host",
            port: 22226,
            secure: false,
            user: "user",
            key: b"secret",
        };
        let report = run_upload(
            &mut client,
            &credentials,
            &UploadOptions::default(),
            &mut source,
        )
        .await;

        server_task.await.unwrap();
        assert!(matches!(report.result, Err(S4ppError::CommitRejected)));
        assert_eq!(report.acknowledged, 0);
    }

    #[tokio::test]
    async fn resume_across_sequences_with_shared_dictionary_entry() {
        let (mut client, server) = Loopback::pair();
        server.send(b"S4PP/1.0 SHA256 100\nTOK:abc\n");

        let server_task = tokio::spawn(async move {
            let sent = wait_for_sent(&server, b"SIG:").await;
            assert_eq!(sent.windows(6).filter(|w| *w == b"DICT:0").count(), 1);
            server.send(b"OK:0\n");
        });

        let samples = [
            sample("T", 2000, 210, 1),
            sample("T", 2005, 212, 1),
        ];
        let mut source = SliceSource::new(&samples);
        let credentials = Credentials {
            server: "host",
            port: 22226,
            secure: false,
            user: "user",
            key: b"secret",
        };
        let report = run_upload(
            &mut client,
            &credentials,
            &UploadOptions::default(),
            &mut source,
        )
        .await;

        server_task.await.unwrap();
        assert!(report.result.is_ok());
        assert_eq!(report.acknowledged, 2);
    }

    #[tokio::test]
    async fn dropped_transport_mid_sequence_acknowledges_nothing() {
        let (mut client, server) = Loopback::pair();
        server.send(b"S4PP/1.0 SHA256 100\nTOK:abc\n");

        let server_task = tokio::spawn(async move {
            wait_for_sent(&server, b"SIG:").await;
            // No OK/NOK — the connection just goes away mid-commit.
            server.close();
        });

        let samples = [sample("T", 2000, 230, 1)];
        let mut source = SliceSource::new(&samples);
        let credentials = Credentials {
            server: "host",
            port: 22226,
            secure: false,
            user: "user",
            key: b"secret",
        };
        let report = run_upload(
            &mut client,
            &credentials,
            &UploadOptions::default(),
            &mut source,
        )
        .await;

        server_task.await.unwrap();
        assert!(matches!(
            report.result,
            Err(S4ppError::Protocol("unexpected disconnect"))
        ));
        assert_eq!(report.acknowledged, 0);
    }

    #[tokio::test]
    async fn config_error_without_waiting_for_transport() {
        let (mut client, _server) = Loopback::pair();
        let mut source = SliceSource::new(&[]);
        let credentials = Credentials {
            server: "host",
            port: 22226,
            secure: false,
            user: "",
            key: b"secret",
        };
        let report = run_upload(
            &mut client,
            &credentials,
            &UploadOptions::default(),
            &mut source,
        )
        .await;
        assert!(matches!(report.result, Err(S4ppError::Config(_))));
        assert_eq!(report.acknowledged, 0);
    }

    #[tokio::test]
    async fn two_sequences_are_sent_before_the_first_reply_arrives() {
        let (mut client, server) = Loopback::pair();
        server.send(b"S4PP/1.0 SHA256 100\nTOK:abc\n");

        let server_task = tokio::spawn(async move {
            // With batch_size=1 each sample closes its own sequence, so by
            // the time two SIG: lines have gone out the driver must have
            // queued the second sequence without waiting for the first
            // sequence's OK — that's the MAX_IN_FLIGHT=2 pipelining itself.
            wait_for_n_sig_lines(&server, 2).await;
            server.send(b"OK:0\n");
            wait_for_n_sig_lines(&server, 3).await;
            server.send(b"OK:1\n");
            server.send(b"OK:2\n");
        });

        let samples = [
            sample("T", 2000, 1, 0),
            sample("T", 2001, 2, 0),
            sample("T", 2002, 3, 0),
        ];
        let mut source = SliceSource::new(&samples);
        let credentials = Credentials {
            server: "host",
            port: 22226,
            secure: false,
            user: "user",
            key: b"secret",
        };
        let options = UploadOptions {
            batch_size: 1,
            ..UploadOptions::default()
        };
        let report = run_upload(&mut client, &credentials, &options, &mut source).await;

        server_task.await.unwrap();
        assert!(report.result.is_ok(), "upload failed: {:?}", report.result.err());
        assert_eq!(report.acknowledged, 3);
    }

    #[tokio::test]
    async fn upload_from_fifo_source_emits_default_unitdiv_in_dict_line() {
        const SECTOR_SIZE: usize = 64;
        let flash = flash_device::mock::MemoryFlash::<SECTOR_SIZE>::new(4);
        let mut fifo = flash_fifo::FlashFifo::format(flash, 3).unwrap();
        fifo.push(&flash_fifo::Sample {
            timestamp: 2000,
            value: 230,
            decimals: 1,
            tag: flash_fifo::Sample::tag_from_str("T"),
        })
        .unwrap();

        let (mut client, server) = Loopback::pair();
        server.send(b"S4PP/1.0 SHA256 100\nTOK:abc\n");

        let server_task = tokio::spawn(async move {
            let sent = wait_for_sent(&server, b"SIG:").await;
            assert!(
                sent.windows(4).any(|w| w == b",1,"),
                "expected a DICT: line with the default unitdiv, got {:?}",
                core::str::from_utf8(&sent)
            );
            server.send(b"OK:0\n");
        });

        let mut source = crate::source::FifoSource::new(&mut fifo);
        let credentials = Credentials {
            server: "host",
            port: 22226,
            secure: false,
            user: "user",
            key: b"secret",
        };
        let report = run_upload(
            &mut client,
            &credentials,
            &UploadOptions::default(),
            &mut source,
        )
        .await;

        server_task.await.unwrap();
        assert!(report.result.is_ok());
        assert_eq!(report.acknowledged, 1);
    }
}
