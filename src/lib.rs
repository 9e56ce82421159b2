/// Account and ledger entry entities. Balances are mutated by handling a
/// request into an entry, then applying that entry; the entry is what lands
/// in the append-only history.
pub mod account;

/// Registration and login for end users, plus the disjoint administrator
/// namespace. Mints the identity tokens every ledger operation requires.
pub mod auth;

/// The ledger operations themselves: deposit, withdraw, transfer and the
/// read-only balance/statement queries.
pub mod ledger;

/// Read-only administrative reporting.
pub mod report;

/// Keyed account storage. The trait is the integration point for swapping
/// the in-memory store for something durable; it also carries the atomicity
/// contract transfers rely on.
pub mod store;

/// Batch driver glue (CSV in, text/CSV out). Could live in a crate of its
/// own, but it stays here so the integration tests drive the exact code
/// path the binary does.
pub mod bin_utils;
