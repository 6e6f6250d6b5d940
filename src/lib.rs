//! Canonicalization and validation engine for branch location datasets.
//!
//! The library is organized as a pipeline over a tree of JSON documents:
//!
//! | Module      | Responsibility                                        |
//! |-------------|-------------------------------------------------------|
//! | `config`    | TOML configuration: data root, bounds, rules, chains  |
//! | `store`     | Tree scan, load, canonical serialization, atomic save |
//! | `classify`  | Document shape detection (meta/summary/index/dataset) |
//! | `models`    | Canonical record types and key ordering               |
//! | `normalize` | Legacy-shape migration into the canonical form        |
//! | `validate`  | Schema and verification rule checking                  |
//! | `enrich`    | Conditional metadata backfill passes                  |
//! | `stats`     | Read-only coverage reporting                          |

pub mod classify;
pub mod config;
pub mod enrich;
pub mod models;
pub mod normalize;
pub mod stats;
pub mod store;
pub mod validate;
