//! Cross-rank exchange: transport primitives and the edge-frontier communicator
//!
//! - `transport`: the [`Collective`] handle (broadcast, all-to-all, barrier)
//!   and its in-process implementation
//! - `frontier`: [`EdgeFrontierCommunicator`], the per-round
//!   transform → route → reduce → update exchange the algorithms ride on
//! - `wire`: frame layout of exchanged buffers

mod frontier;
mod transport;
mod wire;

pub use frontier::EdgeFrontierCommunicator;
pub use transport::{Collective, LocalProcessGroup, LocalTransport};

use crate::error::{GraphError, Result};
use bytemuck::Pod;

/// All-gather a `Pod` slice: every rank receives every rank's slice, in rank
/// order
///
/// # Errors
///
/// Returns a transport error if a peer disconnects or sends a buffer that is
/// not a whole number of `T`.
pub async fn all_gather_pod<C, T>(comm: &C, local: &[T]) -> Result<Vec<Vec<T>>>
where
    C: Collective + ?Sized,
    T: Pod,
{
    let bytes: Vec<u8> = bytemuck::cast_slice(local).to_vec();
    let received = comm.all_to_all(vec![bytes; comm.size()]).await?;

    received
        .into_iter()
        .enumerate()
        .map(|(from, buf)| {
            if buf.len() % std::mem::size_of::<T>() != 0 {
                return Err(GraphError::transport(format!(
                    "rank {from} sent {} bytes, not a whole number of elements",
                    buf.len()
                )));
            }
            Ok(wire::pod_vec(&buf))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_gather_pod() {
        let gathered = LocalProcessGroup::run(3, |comm| async move {
            let local: Vec<u64> = (0..=comm.rank() as u64).collect();
            all_gather_pod(&comm, &local).await
        })
        .await
        .unwrap();

        for per_rank in &gathered {
            assert_eq!(per_rank, &vec![vec![0], vec![0, 1], vec![0, 1, 2]]);
        }
    }
}
