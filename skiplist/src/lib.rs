//! A generic monoid skip-list.
//!
//! The share-chain tracker needs two unrelated aggregates over runs of
//! ancestors: per-branch work/weight/count totals (the tracker's attribute
//! deltas) and PPLNS payout weights (a bounded-window attempts sum). Both are
//! "sum some commutative-ish monoid over a contiguous ancestor range", so
//! this crate factors the skip-pointer bookkeeping out of both call sites,
//! the way the teacher's `tari_mmr` crate factors a Merkle accumulator out of
//! its `MerkleCheckpoint`/`MerkleMountainRange` split: one structural backend,
//! specialized per call site by the delta type it accumulates.
//!
//! Every node keeps binary-lifted pointers `up[node][k] = (2^k-th ancestor,
//! combined delta over the half-open range (ancestor, node])`. Building the
//! pointers for a freshly-inserted node costs `O(log height)` amortized;
//! walking `n` ancestors or summing a delta over a range costs `O(log n)`.

mod delta;
mod skiplist;

pub use delta::Delta;
pub use skiplist::SkipList;
