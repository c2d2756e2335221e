//! Keyed requests from ghost copies to their owners.
//!
//! A rank holding ghost copies sends one key per copy (sorted vertex global
//! IDs, a parent global ID, an entity global ID) to the owning rank; the
//! owner answers every key with a run of words. Two `all_to_all` rounds and
//! an error agreement on `tag + 2`, so every rank must call this even with
//! nothing to ask.

use crate::algs::collective::{agree, all_to_all};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{decode_keys, encode_keys};
use crate::mesh_error::MeshError;
use crate::topology::entity::GlobalId;

/// Answers collected by [`request_from_owners`].
#[derive(Debug, Default)]
pub struct OwnerReplies {
    /// One entry per request, in request order; `None` when the owner did not
    /// know the key.
    pub answers: Vec<Option<Vec<GlobalId>>>,
    /// Keys other ranks asked this rank about that it could not answer.
    pub unknown: Vec<(usize, Vec<GlobalId>)>,
}

impl OwnerReplies {
    /// First failure seen on either side of the exchange.
    pub fn failure(&self, rank: usize, requests: &[(usize, Vec<GlobalId>)], what: &str) -> Option<MeshError> {
        if let Some((peer, key)) = self.unknown.first() {
            return Some(MeshError::inconsistent(
                rank,
                format!("rank {peer} asked for {what} {key:?}, which this rank does not own"),
            ));
        }
        self.answers
            .iter()
            .zip(requests)
            .find(|(a, _)| a.is_none())
            .map(|(_, (owner, key))| {
                MeshError::inconsistent(rank, format!("owner rank {owner} does not know {what} {key:?}"))
            })
    }
}

/// Sends `requests` (`(owner, key)` pairs) to their owners; `answer` is
/// called on the owner side with the requesting rank and the key.
pub fn request_from_owners<C, F>(
    comm: &C,
    tag: CommTag,
    requests: &[(usize, Vec<GlobalId>)],
    mut answer: F,
) -> Result<OwnerReplies, MeshError>
where
    C: Communicator,
    F: FnMut(usize, &[GlobalId]) -> Option<Vec<GlobalId>>,
{
    let size = comm.size();
    let mut per_peer: Vec<Vec<Vec<GlobalId>>> = vec![Vec::new(); size];
    let mut slots: Vec<Vec<usize>> = vec![Vec::new(); size];
    for (i, (owner, key)) in requests.iter().enumerate() {
        // Left unanswered; the caller reports it after the collective rounds.
        if *owner >= size || *owner == comm.rank() {
            log::debug!("rank {}: ghost key {key:?} names invalid owner {owner}", comm.rank());
            continue;
        }
        per_peer[*owner].push(key.clone());
        slots[*owner].push(i);
    }

    let outgoing = per_peer.iter().map(|keys| encode_keys(keys)).collect();
    let incoming = all_to_all(comm, tag, outgoing)?;

    let mut replies = OwnerReplies {
        answers: vec![None; requests.len()],
        unknown: Vec::new(),
    };
    // Decode failures are held back until every rank has finished both rounds.
    let mut failure: Option<MeshError> = None;
    let mut outgoing = Vec::with_capacity(size);
    for (peer, buf) in incoming.iter().enumerate() {
        if peer == comm.rank() {
            outgoing.push(encode_keys(&[]));
            continue;
        }
        let keys = match decode_keys(buf) {
            Ok(keys) => keys,
            Err(err) => {
                failure.get_or_insert(err);
                outgoing.push(encode_keys(&[]));
                continue;
            }
        };
        let mut answers = Vec::with_capacity(keys.len());
        for key in keys {
            match answer(peer, &key) {
                Some(words) => answers.push(words),
                None => {
                    answers.push(Vec::new());
                    replies.unknown.push((peer, key));
                }
            }
        }
        outgoing.push(encode_keys(&answers));
    }
    let incoming = all_to_all(comm, tag.offset(1), outgoing)?;

    for (peer, buf) in incoming.iter().enumerate() {
        if peer == comm.rank() {
            continue;
        }
        let answers = match decode_keys(buf) {
            Ok(answers) => answers,
            Err(err) => {
                failure.get_or_insert(err);
                continue;
            }
        };
        if answers.len() != slots[peer].len() {
            failure.get_or_insert_with(|| MeshError::CommError {
                neighbor: peer,
                reason: format!("{} answers for {} requests", answers.len(), slots[peer].len()),
            });
            continue;
        }
        for (slot, words) in slots[peer].iter().zip(answers) {
            if !words.is_empty() {
                replies.answers[*slot] = Some(words);
            }
        }
    }
    let outcome = match failure {
        Some(err) => Err(err),
        None => Ok(replies),
    };
    agree(comm, tag.offset(2), outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;

    #[test]
    fn owners_answer_their_keys() {
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = LocalComm::universe(2)
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let me = comm.rank() as u64;
                        let other = 1 - comm.rank();
                        let requests = vec![(other, vec![1, 2]), (other, vec![99])];
                        request_from_owners(&comm, CommTag::new(40), &requests, |_, key| {
                            (key != [99]).then(|| vec![key.iter().sum::<u64>() + 100 * me])
                        })
                        .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0].answers, vec![Some(vec![103]), None]);
        assert_eq!(results[1].answers, vec![Some(vec![3]), None]);
        assert_eq!(results[0].unknown, vec![(1, vec![99])]);
        let err = results[0]
            .failure(0, &[(1, vec![1, 2]), (1, vec![99])], "face")
            .unwrap();
        assert!(matches!(err, MeshError::InconsistentTopology { rank: 0, .. }));
    }

    #[test]
    fn corrupt_request_fails_every_rank() {
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = LocalComm::universe(2)
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let tag = CommTag::new(50);
                        if comm.rank() == 1 {
                            // Lands ahead of the real request on rank 0.
                            comm.isend(0, tag, b"junk");
                        }
                        let requests = vec![(1 - comm.rank(), vec![4, 5])];
                        request_from_owners(&comm, tag, &requests, |_, key| Some(key.to_vec()))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(matches!(results[0], Err(MeshError::Serialization(_))));
        assert_eq!(results[0].as_ref().err(), results[1].as_ref().err());
    }
}
