//! Delimited-text wire encodings for the control channel and discovery.
//!
//! Everything parsed here arrives from the network and is best-effort:
//! parsers return `None` for malformed input and callers drop it
//! silently rather than erroring out.

use crate::MAX_WIRE_PARTICIPANTS;

pub const ANNOUNCE_TAG: &str = "TYPEDASH";
pub const ANNOUNCE_VERSION: &str = "1";

/// One control-channel request. A request travels as a single ASCII
/// line; the response is raw bytes terminated by the coordinator
/// closing the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Join,
    FetchText,
    SubmitProgress { id: u32, progress: u32 },
}

impl Request {
    pub fn encode(&self) -> String {
        match self {
            Request::Join => "JOIN".to_string(),
            Request::FetchText => "TEXT".to_string(),
            Request::SubmitProgress { id, progress } => {
                format!("PROGRESS {} {}", id, progress)
            }
        }
    }

    /// Parses a request line. Unknown verbs or malformed arguments
    /// yield `None` and the request is dropped without a response.
    pub fn parse(line: &str) -> Option<Request> {
        let mut parts = line.split_whitespace();
        match parts.next()? {
            "JOIN" => Some(Request::Join),
            "TEXT" => Some(Request::FetchText),
            "PROGRESS" => {
                let id = parts.next()?.parse().ok()?;
                let progress = parts.next()?.parse().ok()?;
                Some(Request::SubmitProgress { id, progress })
            }
            _ => None,
        }
    }
}

/// Encodes a snapshot as `<count> <id> <progress>[;<id> <progress>]...`
/// with one pair per assigned identity.
pub fn encode_snapshot(progresses: &[u32]) -> String {
    let pairs: Vec<String> = progresses
        .iter()
        .enumerate()
        .map(|(id, progress)| format!("{} {}", id, progress))
        .collect();
    format!("{} {}", progresses.len(), pairs.join(";"))
}

/// Decodes a snapshot record. The leading count sizes the result;
/// identities the payload omits keep the zero default, and malformed or
/// out-of-range pairs are skipped. Only a missing, non-numeric, or
/// implausibly large count rejects the payload as a whole.
pub fn decode_snapshot(input: &str) -> Option<Vec<u32>> {
    let input = input.trim();
    let (head, pairs) = match input.split_once(' ') {
        Some((head, rest)) => (head, rest),
        None => (input, ""),
    };
    let count: usize = head.parse().ok()?;
    if count > MAX_WIRE_PARTICIPANTS {
        return None;
    }

    let mut progresses = vec![0u32; count];
    for pair in pairs.split(';') {
        let mut fields = pair.split_whitespace();
        let id = fields.next().and_then(|f| f.parse::<usize>().ok());
        let value = fields.next().and_then(|f| f.parse::<u32>().ok());
        if let (Some(id), Some(value)) = (id, value) {
            if id < count {
                progresses[id] = value;
            }
        }
    }
    Some(progresses)
}

/// A coordinator's presence broadcast. The sender's IP address comes
/// from the receiving socket, never from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub control_port: u16,
    pub label: String,
    pub player_count: usize,
    pub capacity: usize,
}

pub fn encode_announcement(announce: &Announcement) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}",
        ANNOUNCE_TAG,
        ANNOUNCE_VERSION,
        announce.control_port,
        announce.label,
        announce.player_count,
        announce.capacity
    )
}

/// Parses a discovery datagram. The tag and version are checked before
/// any field is parsed, so unrelated traffic sharing the port fails
/// fast and is discarded by the caller.
pub fn parse_announcement(msg: &str) -> Option<Announcement> {
    let parts: Vec<&str> = msg.trim().split('|').collect();
    if parts.len() < 6 {
        return None;
    }
    if parts[0] != ANNOUNCE_TAG || parts[1] != ANNOUNCE_VERSION {
        return None;
    }
    Some(Announcement {
        control_port: parts[2].parse().ok()?,
        label: parts[3].to_string(),
        player_count: parts[4].parse().ok()?,
        capacity: parts[5].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrip() {
        let requests = vec![
            Request::Join,
            Request::FetchText,
            Request::SubmitProgress { id: 3, progress: 17 },
        ];

        for request in requests {
            let line = request.encode();
            assert_eq!(Request::parse(&line), Some(request));
        }
    }

    #[test]
    fn request_rejects_garbage() {
        assert_eq!(Request::parse(""), None);
        assert_eq!(Request::parse("HELLO"), None);
        assert_eq!(Request::parse("PROGRESS"), None);
        assert_eq!(Request::parse("PROGRESS 1"), None);
        assert_eq!(Request::parse("PROGRESS one two"), None);
    }

    #[test]
    fn snapshot_roundtrip() {
        let progresses = vec![5, 12, 0];
        let encoded = encode_snapshot(&progresses);
        assert_eq!(encoded, "3 0 5;1 12;2 0");
        assert_eq!(decode_snapshot(&encoded), Some(progresses));
    }

    #[test]
    fn snapshot_roundtrip_empty() {
        let encoded = encode_snapshot(&[]);
        assert_eq!(decode_snapshot(&encoded), Some(vec![]));
    }

    #[test]
    fn snapshot_partial_payload_keeps_defaults() {
        // Identity 0 and 2 are never named, so they stay at zero.
        assert_eq!(decode_snapshot("3 1 7"), Some(vec![0, 7, 0]));
    }

    #[test]
    fn snapshot_skips_malformed_and_out_of_range_pairs() {
        let decoded = decode_snapshot("3 0 5;bogus;9 4;1 2");
        assert_eq!(decoded, Some(vec![5, 2, 0]));
    }

    #[test]
    fn snapshot_rejects_bad_count() {
        assert_eq!(decode_snapshot(""), None);
        assert_eq!(decode_snapshot("x 0 5"), None);
        assert_eq!(decode_snapshot("18446744073709551616 0 5"), None);
        assert_eq!(decode_snapshot("100000 0 5"), None);
    }

    #[test]
    fn announcement_roundtrip() {
        let announce = Announcement {
            control_port: 25565,
            label: "Room".to_string(),
            player_count: 2,
            capacity: 4,
        };

        let encoded = encode_announcement(&announce);
        assert_eq!(encoded, "TYPEDASH|1|25565|Room|2|4");

        let decoded = parse_announcement(&encoded).unwrap();
        assert_eq!(decoded.control_port, 25565);
        assert_eq!(decoded.label, "Room");
        assert_eq!(decoded.player_count, 2);
        assert_eq!(decoded.capacity, 4);
    }

    #[test]
    fn announcement_rejects_wrong_tag_or_version() {
        assert_eq!(parse_announcement("OTHERGAME|1|25565|Room|2|4"), None);
        assert_eq!(parse_announcement("TYPEDASH|2|25565|Room|2|4"), None);
    }

    #[test]
    fn announcement_rejects_short_or_non_numeric_records() {
        assert_eq!(parse_announcement("TYPEDASH|1|25565|Room"), None);
        assert_eq!(parse_announcement("TYPEDASH|1|port|Room|2|4"), None);
        assert_eq!(parse_announcement("TYPEDASH|1|25565|Room|two|4"), None);
        assert_eq!(parse_announcement("TYPEDASH|1|25565|Room|2|cap"), None);
        assert_eq!(parse_announcement(""), None);
    }
}
