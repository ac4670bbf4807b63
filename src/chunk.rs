//! Word-budget clause chunker.
//!
//! Groups segmented clauses into batches that stay under a configurable
//! word budget, so each external model call fits comfortably inside the
//! model's token limit.
//!
//! # Algorithm
//!
//! 1. Walk the clauses in order, keeping a running batch and word count.
//! 2. When adding the next clause would exceed `max_words` and the batch
//!    is non-empty, flush the batch (clauses joined with a blank line)
//!    and start a new one with that clause.
//! 3. A single clause larger than `max_words` forms its own oversized
//!    chunk; clauses are never split mid-text.
//!
//! # Example
//!
//! ```rust
//! use contract_lens::chunk::chunk_clauses;
//!
//! let clauses = vec!["one two three".to_string(), "four five".to_string()];
//! let chunks = chunk_clauses(&clauses, 3);
//! assert_eq!(chunks, vec!["one two three", "four five"]);
//! ```

/// Group clauses into chunk strings under `max_words` words each.
///
/// # Guarantees
///
/// - Every input clause appears in exactly one chunk, in original order.
/// - No chunk exceeds `max_words` unless it holds a single clause that
///   alone exceeds the budget.
pub fn chunk_clauses(clauses: &[String], max_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut count = 0usize;

    for clause in clauses {
        let words = clause.split_whitespace().count();
        if count + words > max_words && !current.is_empty() {
            chunks.push(current.join("\n\n"));
            current.clear();
            count = 0;
        }
        current.push(clause);
        count += words;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }

    chunks
}
