//! Collective operations built from point-to-point messages.
//!
//! Every rank of the communicator must call the same collectives in the same
//! order with the same tags. Each call posts all receives, posts all sends,
//! then drains every handle before returning, even when a receive fails.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{decode_values, encode_values};
use crate::mesh_error::MeshError;

/// Sends `outgoing[p]` to every peer `p` listed in `send_to` and receives one
/// message from every peer in `recv_from`.
fn exchange<C: Communicator>(
    comm: &C,
    tag: CommTag,
    outgoing: &[Vec<u8>],
    send_to: &[usize],
    recv_from: &[usize],
) -> Result<Vec<(usize, Vec<u8>)>, MeshError> {
    let recvs: Vec<(usize, C::RecvHandle)> = recv_from
        .iter()
        .map(|&p| (p, comm.irecv(p, tag)))
        .collect();
    let sends: Vec<C::SendHandle> = send_to
        .iter()
        .map(|&p| comm.isend(p, tag, &outgoing[p]))
        .collect();

    let mut received = Vec::with_capacity(recvs.len());
    let mut maybe_err = None;
    for (peer, h) in recvs {
        match h.wait() {
            Some(data) => received.push((peer, data)),
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshError::CommError {
                    neighbor: peer,
                    reason: format!("no message received for tag {}", tag.as_u16()),
                });
            }
            None => {}
        }
    }
    for s in sends {
        let _ = s.wait();
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(received),
    }
}

fn peers<C: Communicator>(comm: &C) -> Vec<usize> {
    (0..comm.size()).filter(|&p| p != comm.rank()).collect()
}

/// Personalized exchange: `outgoing[p]` goes to rank `p`; the result holds
/// the buffer each rank sent here, the own slot included.
pub fn all_to_all<C: Communicator>(
    comm: &C,
    tag: CommTag,
    mut outgoing: Vec<Vec<u8>>,
) -> Result<Vec<Vec<u8>>, MeshError> {
    if outgoing.len() != comm.size() {
        return Err(MeshError::InvalidParameters(format!(
            "all_to_all needs {} buffers, got {}",
            comm.size(),
            outgoing.len()
        )));
    }
    let others = peers(comm);
    let received = exchange(comm, tag, &outgoing, &others, &others)?;
    let mut incoming = vec![Vec::new(); comm.size()];
    incoming[comm.rank()] = std::mem::take(&mut outgoing[comm.rank()]);
    for (peer, data) in received {
        incoming[peer] = data;
    }
    Ok(incoming)
}

/// Every rank contributes `mine`; everyone gets all contributions by rank.
pub fn all_gather<C: Communicator>(
    comm: &C,
    tag: CommTag,
    mine: &[u8],
) -> Result<Vec<Vec<u8>>, MeshError> {
    all_to_all(comm, tag, vec![mine.to_vec(); comm.size()])
}

/// `root`'s `data` reaches every rank; other ranks' `data` is ignored.
pub fn broadcast<C: Communicator>(
    comm: &C,
    tag: CommTag,
    root: usize,
    data: &[u8],
) -> Result<Vec<u8>, MeshError> {
    if comm.rank() == root {
        let outgoing = vec![data.to_vec(); comm.size()];
        exchange(comm, tag, &outgoing, &peers(comm), &[])?;
        Ok(data.to_vec())
    } else {
        let mut got = exchange(comm, tag, &[], &[], &[root])?;
        Ok(got.pop().map(|(_, d)| d).unwrap_or_default())
    }
}

/// `root` hands `parts[p]` to rank `p`; `parts` is only read on `root`.
pub fn scatter<C: Communicator>(
    comm: &C,
    tag: CommTag,
    root: usize,
    mut parts: Vec<Vec<u8>>,
) -> Result<Vec<u8>, MeshError> {
    if comm.rank() == root {
        if parts.len() != comm.size() {
            return Err(MeshError::InvalidParameters(format!(
                "scatter needs {} parts, got {}",
                comm.size(),
                parts.len()
            )));
        }
        exchange(comm, tag, &parts, &peers(comm), &[])?;
        Ok(std::mem::take(&mut parts[root]))
    } else {
        let mut got = exchange(comm, tag, &[], &[], &[root])?;
        Ok(got.pop().map(|(_, d)| d).unwrap_or_default())
    }
}

fn gather_u64<C: Communicator>(comm: &C, tag: CommTag, value: u64) -> Result<Vec<u64>, MeshError> {
    let all = all_gather(comm, tag, &encode_values(&[value]))?;
    let mut out = Vec::with_capacity(all.len());
    for (peer, buf) in all.iter().enumerate() {
        match decode_values(buf)?.as_slice() {
            [v] => out.push(*v),
            other => {
                return Err(MeshError::CommError {
                    neighbor: peer,
                    reason: format!("expected one value, got {}", other.len()),
                });
            }
        }
    }
    Ok(out)
}

pub fn all_reduce_max<C: Communicator>(comm: &C, tag: CommTag, value: u64) -> Result<u64, MeshError> {
    Ok(gather_u64(comm, tag, value)?.into_iter().max().unwrap_or(value))
}

pub fn all_reduce_sum<C: Communicator>(comm: &C, tag: CommTag, value: u64) -> Result<u64, MeshError> {
    Ok(gather_u64(comm, tag, value)?.into_iter().sum())
}

/// Returns `(sum of values on lower ranks, sum over all ranks)`.
pub fn exclusive_scan<C: Communicator>(
    comm: &C,
    tag: CommTag,
    value: u64,
) -> Result<(u64, u64), MeshError> {
    let all = gather_u64(comm, tag, value)?;
    let offset = all[..comm.rank()].iter().sum();
    Ok((offset, all.iter().sum()))
}

/// Error agreement: if any rank failed, every rank returns the failure of the
/// lowest failing rank. Otherwise the local value is passed through.
pub fn agree<C: Communicator, T>(
    comm: &C,
    tag: CommTag,
    local: Result<T, MeshError>,
) -> Result<T, MeshError> {
    if comm.is_serial() {
        return local;
    }
    let status: Option<&MeshError> = local.as_ref().err();
    let payload = bincode::serialize(&status)?;
    let all = all_gather(comm, tag, &payload)?;
    for (peer, buf) in all.iter().enumerate() {
        if peer == comm.rank() {
            if let Err(err) = local {
                return Err(err);
            }
            continue;
        }
        let remote: Option<MeshError> = bincode::deserialize(buf)?;
        if let Some(err) = remote {
            log::debug!("rank {} adopts failure of rank {}: {}", comm.rank(), peer, err);
            return Err(err);
        }
    }
    local
}
