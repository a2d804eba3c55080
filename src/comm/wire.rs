//! Exchange frame layout
//!
//! ```text
//! offset  size        field
//! 0       1           status (0 = ok, 1 = abort)
//! 1       7           padding
//! 8       8           vertex (abort: offending global id, ok: 0)
//! 16      8           count
//! 24      count*|V|   destination ids
//! ..      count*|T|   reduced values
//! ```
//!
//! Integers are native-endian: ranks of one group run the same build on the
//! same architecture.

use crate::error::{GraphError, Result};
use bytemuck::Pod;
use std::mem::size_of;

const HEADER_LEN: usize = 24;
const STATUS_OK: u8 = 0;
const STATUS_ABORT: u8 = 1;

/// Decoded exchange frame
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame<V, T> {
    /// Keyed contributions for the receiving rank
    Data { ids: Vec<V>, values: Vec<T> },
    /// Sender hit a fatal configuration error this round
    Abort { vertex: u64 },
}

pub(crate) fn encode_data<V: Pod, T: Pod>(ids: &[V], values: &[T]) -> Vec<u8> {
    debug_assert_eq!(ids.len(), values.len());
    let id_bytes: &[u8] = bytemuck::cast_slice(ids);
    let value_bytes: &[u8] = bytemuck::cast_slice(values);

    let mut buf = Vec::with_capacity(HEADER_LEN + id_bytes.len() + value_bytes.len());
    buf.push(STATUS_OK);
    buf.extend_from_slice(&[0; 7]);
    buf.extend_from_slice(&0_u64.to_ne_bytes());
    buf.extend_from_slice(&(ids.len() as u64).to_ne_bytes());
    buf.extend_from_slice(id_bytes);
    buf.extend_from_slice(value_bytes);
    buf
}

pub(crate) fn encode_abort(vertex: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN);
    buf.push(STATUS_ABORT);
    buf.extend_from_slice(&[0; 7]);
    buf.extend_from_slice(&vertex.to_ne_bytes());
    buf.extend_from_slice(&0_u64.to_ne_bytes());
    buf
}

pub(crate) fn decode<V: Pod, T: Pod>(buf: &[u8], from: usize) -> Result<Frame<V, T>> {
    let malformed =
        |what: &str| GraphError::transport(format!("malformed frame from rank {from}: {what}"));

    if buf.len() < HEADER_LEN {
        return Err(malformed("truncated header"));
    }
    let vertex = read_u64(&buf[8..16]);
    let count = usize::try_from(read_u64(&buf[16..24])).map_err(|_| malformed("count overflow"))?;

    match buf[0] {
        STATUS_ABORT => Ok(Frame::Abort { vertex }),
        STATUS_OK => {
            let ids_len = count
                .checked_mul(size_of::<V>())
                .ok_or_else(|| malformed("count overflow"))?;
            let body = &buf[HEADER_LEN..];
            if body.len().checked_sub(ids_len) != count.checked_mul(size_of::<T>()) {
                return Err(malformed("body length does not match count"));
            }
            let (id_bytes, value_bytes) = body.split_at(ids_len);
            Ok(Frame::Data {
                ids: pod_vec(id_bytes),
                values: pod_vec(value_bytes),
            })
        }
        other => Err(malformed(&format!("unknown status {other}"))),
    }
}

/// Copy an unaligned byte slice into a typed vector
pub(crate) fn pod_vec<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytemuck::allocation::pod_collect_to_vec(bytes)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut word = [0_u8; 8];
    word.copy_from_slice(bytes);
    u64::from_ne_bytes(word)
}
