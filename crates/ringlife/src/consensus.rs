//! Global cycle consensus and termination.
//!
//! Every rank reports its local cycle result to the coordinator, which
//! reduces them with all-agree semantics and broadcasts a [`Verdict`]. A
//! worker only ever stops because a verdict told it to.

use ringlife_core::message::message_type::{CYCLE_REPORT, VERDICT};
use ringlife_core::prelude::*;

/// Coordinator decision for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    /// Iteration the whole world repeats, if every rank agreed on one.
    pub cycle: Option<u64>,
    /// Whether every rank must leave the simulation loop.
    pub stop: bool,
}

/// Reduce per-rank cycle reports.
///
/// The result is the first report if every report is identical to it, and
/// `None` otherwise. Unanimous "no match" also yields `None`.
pub fn agree<I>(reports: I) -> Option<u64>
where
    I: IntoIterator<Item = Option<u64>>,
{
    let mut reports = reports.into_iter();
    let first = reports.next()?;
    if reports.all(|r| r == first) {
        first
    } else {
        None
    }
}

/// Run the consensus round for `iteration`.
///
/// `local` is this rank's own cycle result. The coordinator additionally
/// stops everyone once `iteration + 1 >= step_limit`; other ranks ignore
/// `step_limit` and follow the broadcast verdict.
pub async fn consensus_round(
    endpoint: &mut Endpoint,
    iteration: u64,
    local: Option<u64>,
    step_limit: u64,
) -> Result<Verdict> {
    let rank = endpoint.rank();

    if !rank.is_root() {
        endpoint
            .deliver(
                Rank::ROOT,
                MessageEnvelope::new(CYCLE_REPORT, rank, iteration, iteration, encode_match(local)),
            )
            .await?;
        let envelope = endpoint.recv_from(Rank::ROOT, VERDICT, iteration).await?;
        return decode_verdict(&envelope);
    }

    let mut reports = Vec::with_capacity(endpoint.size());
    reports.push(local);
    for r in 1..endpoint.size() {
        let envelope = endpoint.recv_from(Rank(r), CYCLE_REPORT, iteration).await?;
        reports.push(decode_match(&envelope)?);
    }

    let cycle = agree(reports.iter().copied());
    let verdict = Verdict {
        cycle,
        stop: cycle.is_some() || iteration + 1 >= step_limit,
    };

    if cycle.is_none() && reports.iter().any(Option::is_some) {
        tracing::debug!(
            "iteration {}: ranks disagree on local cycles {:?}",
            iteration,
            reports
        );
    }

    let payload = encode_verdict(&verdict);
    for r in 1..endpoint.size() {
        endpoint
            .deliver(
                Rank(r),
                MessageEnvelope::new(VERDICT, rank, iteration, iteration, payload.clone()),
            )
            .await?;
    }

    Ok(verdict)
}

const MATCH_LEN: usize = 9;
const VERDICT_LEN: usize = 10;

fn encode_match(value: Option<u64>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(MATCH_LEN);
    payload.push(value.is_some() as u8);
    payload.extend_from_slice(&value.unwrap_or(0).to_le_bytes());
    payload
}

fn parse_match(bytes: &[u8]) -> Result<Option<u64>> {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[1..MATCH_LEN]);
    match bytes[0] {
        0 => Ok(None),
        1 => Ok(Some(u64::from_le_bytes(word))),
        flag => Err(RingLifeError::Malformed(format!(
            "invalid match flag {}",
            flag
        ))),
    }
}

fn decode_match(envelope: &MessageEnvelope) -> Result<Option<u64>> {
    parse_match(envelope.expect_len(MATCH_LEN)?)
}

fn encode_verdict(verdict: &Verdict) -> Vec<u8> {
    let mut payload = encode_match(verdict.cycle);
    payload.push(verdict.stop as u8);
    payload
}

fn decode_verdict(envelope: &MessageEnvelope) -> Result<Verdict> {
    let bytes = envelope.expect_len(VERDICT_LEN)?;
    let cycle = parse_match(&bytes[..MATCH_LEN])?;
    let stop = match bytes[MATCH_LEN] {
        0 => false,
        1 => true,
        flag => {
            return Err(RingLifeError::Malformed(format!(
                "invalid stop flag {}",
                flag
            )))
        }
    };
    Ok(Verdict { cycle, stop })
}
