//! Bloomgate Providers — issue-tracker adapters.
//!
//! Each tracker (Jira, Linear) implements the [`provider::IssueProvider`]
//! contract: webhook parsing, signature verification, sprint polling, and
//! the reverse mark-as-done transition. Status and type vocabularies are
//! mapping tables, not code, so the dispatch layer never sees a raw
//! provider string.

pub mod jira;
pub mod linear;
pub mod provider;
pub mod signature;
