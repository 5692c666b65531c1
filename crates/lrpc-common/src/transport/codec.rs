use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::protocol::error::Result;
use crate::protocol::{InvocationHeader, ReplyHeader};

/// Wire format of an inbound payload.
///
/// The platform only carries JSON, so both formats are JSON at the outer
/// boundary: the binary format is a single JSON string while the text format
/// is a JSON object.
///
/// # Example
///
/// ```
/// use lrpc_common::transport::WireFormat;
///
/// assert_eq!(WireFormat::detect(b"  {\"method\":\"Arith.Multiply\"}"), WireFormat::Text);
/// assert_eq!(WireFormat::detect(b"\"AAEC\""), WireFormat::Binary);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Structural binary values inside a JSON string
    Binary,
    /// JSON-RPC style object
    Text,
}

impl WireFormat {
    /// Picks the format from the first non-whitespace byte of `payload`.
    ///
    /// A leading `{` always selects [`WireFormat::Text`], whether or not the
    /// rest of the payload is valid; anything else selects
    /// [`WireFormat::Binary`].
    pub fn detect(payload: &[u8]) -> Self {
        match payload.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => WireFormat::Text,
            _ => WireFormat::Binary,
        }
    }
}

/// Binary envelope codec
///
/// Requests are built in two stages: the [`InvocationHeader`] and the
/// argument are written back to back with `postcard`, then the whole buffer
/// is wrapped as a base64 JSON string so the platform sees valid JSON while
/// the inner values keep their exact types.
///
/// Replies are not wrapped. They hold, in order, the request id, the
/// [`ReplyHeader`] and, only when the header carries no error, the reply
/// value.
///
/// # Example
///
/// ```
/// use lrpc_common::transport::BinaryCodec;
/// use lrpc_common::protocol::InvocationHeader;
///
/// let header = InvocationHeader::new("Arith.Multiply", 1);
/// let payload = BinaryCodec::encode_request(&header, &(6i64, 7i64)).unwrap();
///
/// let buffer = BinaryCodec::unwrap_request(&payload).unwrap();
/// let (decoded, body) = BinaryCodec::decode_request_header(&buffer).unwrap();
/// assert_eq!(decoded, header);
/// assert_eq!(BinaryCodec::decode_value::<(i64, i64)>(body).unwrap(), (6, 7));
/// ```
pub struct BinaryCodec;

impl BinaryCodec {
    /// Encode an invocation into a JSON-wrapped payload
    pub fn encode_request<A>(header: &InvocationHeader, args: &A) -> Result<Vec<u8>>
    where
        A: Serialize + ?Sized,
    {
        let mut buffer = postcard::to_stdvec(header)?;
        buffer.extend_from_slice(&postcard::to_stdvec(args)?);
        Ok(serde_json::to_vec(&STANDARD.encode(&buffer))?)
    }

    /// Recover the inner binary buffer from a JSON-wrapped payload
    pub fn unwrap_request(payload: &[u8]) -> Result<Vec<u8>> {
        let encoded: String = serde_json::from_slice(payload)?;
        Ok(STANDARD.decode(encoded.as_bytes())?)
    }

    /// Decode the invocation header, returning the undecoded argument bytes
    pub fn decode_request_header(buffer: &[u8]) -> Result<(InvocationHeader, &[u8])> {
        Ok(postcard::take_from_bytes(buffer)?)
    }

    /// Encode a single structural value
    pub fn encode_value<T>(value: &T) -> Result<Vec<u8>>
    where
        T: Serialize + ?Sized,
    {
        Ok(postcard::to_stdvec(value)?)
    }

    /// Decode a single structural value
    pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(postcard::from_bytes(bytes)?)
    }

    /// Encode a reply
    ///
    /// `body` is the already encoded reply value. It is written only when
    /// `header` has no error.
    pub fn encode_reply(request_id: &str, header: &ReplyHeader, body: &[u8]) -> Result<Vec<u8>> {
        let mut out = postcard::to_stdvec(request_id)?;
        out.extend_from_slice(&postcard::to_stdvec(header)?);
        if !header.is_error() {
            out.extend_from_slice(body);
        }
        Ok(out)
    }

    /// Decode the request id and reply header, returning the remaining bytes
    /// that hold the reply value (empty when the header has an error).
    pub fn decode_reply(payload: &[u8]) -> Result<(String, ReplyHeader, &[u8])> {
        let (request_id, rest): (String, &[u8]) = postcard::take_from_bytes(payload)?;
        let (header, rest): (ReplyHeader, &[u8]) = postcard::take_from_bytes(rest)?;
        Ok((request_id, header, rest))
    }
}
