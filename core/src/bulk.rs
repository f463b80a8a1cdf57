//! The bulk executor: run the pipeline over a list of addresses with
//! bounded parallelism, preserving input order in the output.

use futures::stream::{self, StreamExt};

use crate::verdict::Verdict;
use crate::Verifier;

/// Fixed worker count — chosen to avoid tripping downstream spam filters
/// and local NAT/ephemeral-port exhaustion under a large batch.
pub const BULK_WORKER_COUNT: usize = 5;

/// Verifies every address in `emails`, fanning out to [`BULK_WORKER_COUNT`]
/// concurrent pipeline runs. Each item runs independently (including its own
/// cache read/write); one item's failure surfaces only as that item's
/// verdict, never aborts the batch. The result is re-sorted back to input
/// order — `buffer_unordered` completes items out of order, but callers need
/// `results[i]` to describe `emails[i]`.
pub async fn verify_all(verifier: &Verifier, emails: &[String]) -> Vec<Verdict> {
    let mut indexed: Vec<(usize, Verdict)> = stream::iter(emails.iter().enumerate())
        .map(|(index, email)| async move { (index, verifier.verify(email).await) })
        .buffer_unordered(BULK_WORKER_COUNT)
        .collect()
        .await;

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, verdict)| verdict).collect()
}
